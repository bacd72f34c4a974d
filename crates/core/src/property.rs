//! Managed properties.

use serde::{Deserialize, Serialize};

use crate::id::{PropertyId, UserId};
use crate::Time;

/// A property whose cleaning is coordinated by the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    /// Unique identifier
    pub id: PropertyId,

    /// Display name used in notifications
    pub name: String,

    /// Owner of the property
    pub owner_id: UserId,

    /// Managers bound to the property
    pub manager_ids: Vec<UserId>,

    /// Creation timestamp
    pub created_at: Time,
}

impl Property {
    /// Create a property with no managers.
    pub fn new(id: PropertyId, name: impl Into<String>, owner_id: UserId) -> Self {
        Self {
            id,
            name: name.into(),
            owner_id,
            manager_ids: Vec::new(),
            created_at: chrono::Utc::now(),
        }
    }

    /// Bind managers to the property.
    pub fn with_managers(mut self, managers: impl IntoIterator<Item = UserId>) -> Self {
        self.manager_ids = crate::work_unit::ordered_set(managers);
        self
    }
}
