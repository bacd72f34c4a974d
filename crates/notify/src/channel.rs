//! Outbound messaging channels.
//!
//! The transport is an injected capability: the dispatcher only knows it can
//! hand a rendered message to an external recipient id and that the attempt
//! may fail.

use std::time::Duration;

use async_trait::async_trait;

/// Errors a channel can report for a single delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The transport answered but refused the message
    #[error("message rejected: {0}")]
    Rejected(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Channel could not be built from configuration
    #[error("channel misconfigured: {0}")]
    Config(String),
}

/// Channel for sending notifications to users.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Channel name, for logs.
    fn name(&self) -> &str;

    /// Deliver one message to one external recipient.
    async fn send(&self, recipient: &str, message: &str) -> Result<(), ChannelError>;
}

/// Channel that writes messages to the tracing log. Always succeeds.
#[derive(Debug, Default, Clone)]
pub struct LogChannel;

#[async_trait]
impl MessageChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, recipient: &str, message: &str) -> Result<(), ChannelError> {
        tracing::info!(recipient, "notification: {}", message);
        Ok(())
    }
}

/// Channel that POSTs each message as JSON to a webhook.
///
/// Body: `{"recipient": "...", "text": "..."}`. Any non-2xx answer counts as
/// a failed delivery.
pub struct WebhookChannel {
    url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    /// Create a webhook channel with a per-request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChannelError> {
        let url = url.into();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ChannelError::Config(format!("not an http(s) url: {}", url)));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, client })
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl MessageChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, recipient: &str, message: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({ "recipient": recipient, "text": message });
        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Rejected(format!("{} answered {}", self.url, status)));
        }
        Ok(())
    }
}
