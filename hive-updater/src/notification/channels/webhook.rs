//! Generic webhook notification channel.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::NotificationChannel;
use crate::notification::events::{NotificationEvent, NotificationPriority};
use crate::{Error, Result};

/// Webhook channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub enabled: bool,
    pub url: String,
    /// Optional bearer token sent in the Authorization header.
    pub bearer_token: Option<String>,
    /// Minimum priority level to send (default: Normal).
    #[serde(default)]
    pub min_priority: NotificationPriority,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            bearer_token: None,
            min_priority: NotificationPriority::Normal,
            timeout_secs: default_timeout(),
        }
    }
}

impl WebhookConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Generic webhook notification channel.
pub struct WebhookChannel {
    config: WebhookConfig,
    client: Client,
}

impl WebhookChannel {
    pub fn new(config: WebhookConfig) -> Self {
        hive_api::install_rustls_provider();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self { config, client }
    }

    /// JSON body: a flat summary for simple receivers plus the full event
    /// under `event`.
    fn build_payload(&self, event: &NotificationEvent) -> serde_json::Value {
        json!({
            "source": "hive-updater",
            "event_type": event.event_type(),
            "priority": event.priority().to_string(),
            "title": event.title(),
            "description": event.description(),
            "timestamp": event.timestamp().to_rfc3339(),
            "player": event.player(),
            "event": event
        })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn channel_type(&self) -> &'static str {
        "webhook"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.url.is_empty()
    }

    async fn send(&self, event: &NotificationEvent) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        if event.priority() < self.config.min_priority {
            return Ok(());
        }

        let mut request = self
            .client
            .post(&self.config.url)
            .json(&self.build_payload(event));
        if let Some(token) = &self.config.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::notification(format!("Webhook request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::notification(format!(
                "Webhook returned {status}: {body}"
            )));
        }

        debug!(
            event_type = event.event_type(),
            url = %self.config.url,
            "Webhook notification sent"
        );
        Ok(())
    }
}
