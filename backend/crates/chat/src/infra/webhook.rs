//! Notification delivery
//!
//! Reports go to a webhook when one is configured, otherwise to the log.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use crate::domain::repository::Notifier;
use crate::error::{ChatError, ChatResult};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Posts `{"text": ...}` to a webhook URL; any 2xx counts as delivered
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> ChatResult<Self> {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| ChatError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl Notifier for WebhookNotifier {
    async fn notify(&self, text: &str) -> ChatResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { text })
            .send()
            .await
            .map_err(|e| ChatError::Notification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Notification(format!("webhook returned {status}")));
        }

        tracing::debug!(status = %status, "Webhook notification delivered");
        Ok(())
    }
}

/// Writes the report to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(&self, text: &str) -> ChatResult<()> {
        tracing::info!(report = %text, "Usage report");
        Ok(())
    }
}

/// Notifier chosen at startup
pub enum NotifierBackend {
    Webhook(WebhookNotifier),
    Log(LogNotifier),
}

impl Notifier for NotifierBackend {
    async fn notify(&self, text: &str) -> ChatResult<()> {
        match self {
            Self::Webhook(notifier) => notifier.notify(text).await,
            Self::Log(notifier) => notifier.notify(text).await,
        }
    }
}
