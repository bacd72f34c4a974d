//! Mapping of internal users to external channel identities.

use std::collections::HashMap;

use async_trait::async_trait;
use crewline_core::UserId;

/// Resolves the external channel id of a user.
#[async_trait]
pub trait RecipientResolver: Send + Sync {
    /// External id, or `None` when the user never linked a channel.
    async fn external_id(&self, user: &UserId) -> Option<String>;
}

/// Resolver backed by a fixed directory, typically loaded from config.
#[derive(Debug, Default, Clone)]
pub struct DirectoryResolver {
    entries: HashMap<UserId, String>,
}

impl DirectoryResolver {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Link a user to an external id.
    pub fn link(mut self, user: impl Into<UserId>, external_id: impl Into<String>) -> Self {
        self.entries.insert(user.into(), external_id.into());
        self
    }
}

impl FromIterator<(UserId, String)> for DirectoryResolver {
    fn from_iter<I: IntoIterator<Item = (UserId, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl RecipientResolver for DirectoryResolver {
    async fn external_id(&self, user: &UserId) -> Option<String> {
        self.entries
            .get(user)
            .filter(|id| !id.trim().is_empty())
            .cloned()
    }
}
