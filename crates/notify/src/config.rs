//! Notification configuration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crewline_core::UserId;
use serde::{Deserialize, Serialize};

use crate::channel::{ChannelError, LogChannel, MessageChannel, WebhookChannel};
use crate::resolver::DirectoryResolver;
use crate::template::{TemplateKind, TemplateSet};

/// Which channel to deliver through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelConfig {
    /// Write notifications to the log
    Log,

    /// POST notifications to a webhook
    Webhook {
        url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig::Log
    }
}

/// Notification settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Delivery channel
    pub channel: ChannelConfig,

    /// Internal user id → external channel id
    pub recipients: HashMap<String, String>,

    /// Per-kind text overrides
    pub templates: HashMap<TemplateKind, String>,
}

impl NotifyConfig {
    /// Build the configured channel.
    pub fn build_channel(&self) -> Result<Arc<dyn MessageChannel>, ChannelError> {
        match &self.channel {
            ChannelConfig::Log => Ok(Arc::new(LogChannel)),
            ChannelConfig::Webhook { url, timeout_secs } => Ok(Arc::new(WebhookChannel::new(
                url.clone(),
                Duration::from_secs(*timeout_secs),
            )?)),
        }
    }

    /// Directory of linked recipients.
    pub fn resolver(&self) -> DirectoryResolver {
        self.recipients
            .iter()
            .map(|(user, external)| (UserId::new(user.clone()), external.clone()))
            .collect()
    }

    /// Template set with the configured overrides.
    pub fn templates(&self) -> TemplateSet {
        TemplateSet::with_overrides(self.templates.clone())
    }
}
