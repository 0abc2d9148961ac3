//! Discord webhook notification channel.
//!
//! Retries on 429 responses respecting the Retry-After header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::NotificationChannel;
use crate::notification::events::{NotificationEvent, NotificationPriority};
use crate::{Error, Result};

/// Maximum number of retries for rate-limited requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Discord channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub enabled: bool,
    pub webhook_url: String,
    /// Optional username for the webhook.
    pub username: Option<String>,
    /// Minimum priority level to send (default: Normal).
    #[serde(default)]
    pub min_priority: NotificationPriority,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: String::new(),
            username: Some("hive-updater".to_string()),
            min_priority: NotificationPriority::Normal,
        }
    }
}

impl DiscordConfig {
    pub fn from_url(webhook_url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            webhook_url: webhook_url.into(),
            ..Default::default()
        }
    }
}

/// Discord notification channel.
pub struct DiscordChannel {
    config: DiscordConfig,
    client: Client,
}

impl DiscordChannel {
    pub fn new(config: DiscordConfig) -> Self {
        hive_api::install_rustls_provider();
        Self {
            config,
            client: Client::new(),
        }
    }

    fn get_color(priority: NotificationPriority) -> u32 {
        match priority {
            NotificationPriority::Low => 0x808080,      // Gray
            NotificationPriority::Normal => 0x3498db,   // Blue
            NotificationPriority::High => 0xf39c12,     // Orange
            NotificationPriority::Critical => 0xe74c3c, // Red
        }
    }

    /// Inline embed fields describing the event's subject.
    fn embed_fields(event: &NotificationEvent) -> Vec<serde_json::Value> {
        let field =
            |name: &str, value: String| json!({ "name": name, "value": value, "inline": true });
        match event {
            NotificationEvent::RankChanged {
                player,
                player_name,
                old_rank,
                new_rank,
                ..
            } => vec![
                field("Player", format!("{player_name} ({player})")),
                field("Previous rank", old_rank.to_string()),
                field("Rank", new_rank.to_string()),
            ],
            NotificationEvent::ErrorReported { context, .. } => {
                vec![field("Context", format!("`{context}`"))]
            }
            NotificationEvent::SystemStartup { version, .. } => {
                vec![field("Version", version.clone())]
            }
            NotificationEvent::SystemShutdown { .. } => Vec::new(),
        }
    }

    fn build_payload(&self, event: &NotificationEvent) -> serde_json::Value {
        let mut embed = json!({
            "title": event.title(),
            "description": event.description(),
            "color": Self::get_color(event.priority()),
            "timestamp": event.timestamp().to_rfc3339(),
            "footer": { "text": event.event_type() }
        });

        let fields = Self::embed_fields(event);
        if !fields.is_empty() {
            embed["fields"] = json!(fields);
        }

        let mut payload = json!({ "embeds": [embed] });
        if let Some(username) = &self.config.username {
            payload["username"] = json!(username);
        }
        payload
    }

    async fn send_with_retry(&self, payload: &serde_json::Value) -> Result<()> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let response = self
                .client
                .post(&self.config.webhook_url)
                .json(payload)
                .send()
                .await
                .map_err(|e| Error::notification(format!("Discord request failed: {}", e)))?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            if status.as_u16() == 429 {
                let retry_after = parse_retry_after(&response);

                if attempts >= MAX_RATE_LIMIT_RETRIES {
                    warn!(
                        retries = MAX_RATE_LIMIT_RETRIES,
                        retry_after = ?retry_after,
                        "Discord rate limit: max retries exceeded"
                    );
                    return Err(Error::notification(format!(
                        "Discord rate limit exceeded after {} retries",
                        MAX_RATE_LIMIT_RETRIES
                    )));
                }

                let wait = retry_after.unwrap_or(Duration::from_secs(1));
                debug!(wait = ?wait, attempt = attempts, "Discord rate limited, retrying");
                tokio::time::sleep(wait).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(Error::notification(format!(
                "Discord webhook returned {status}: {body}"
            )));
        }
    }
}

fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    for header in ["Retry-After", "X-RateLimit-Reset-After"] {
        if let Some(value) = response.headers().get(header)
            && let Ok(secs) = value.to_str().ok()?.parse::<f64>()
        {
            return Some(Duration::from_secs_f64(secs));
        }
    }
    None
}

#[async_trait]
impl NotificationChannel for DiscordChannel {
    fn channel_type(&self) -> &'static str {
        "discord"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.webhook_url.is_empty()
    }

    async fn send(&self, event: &NotificationEvent) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        if event.priority() < self.config.min_priority {
            return Ok(());
        }

        self.send_with_retry(&self.build_payload(event)).await?;
        debug!(event_type = event.event_type(), "Discord notification sent");
        Ok(())
    }
}
