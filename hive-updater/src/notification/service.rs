//! Notification service implementation.
//!
//! The NotificationService is responsible for:
//! - Fanning out each event to every enabled channel
//! - Isolating channel failures from each other and from the caller
//! - Implementing circuit breaker pattern for failing channels

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::channels::{
    DiscordChannel, DiscordConfig, NotificationChannel, WebhookChannel, WebhookConfig,
};
use super::events::NotificationEvent;

/// Broadcast channel capacity for internal subscribers.
const EVENT_BROADCAST_CAPACITY: usize = 256;

/// Configuration for the notification service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationServiceConfig {
    pub enabled: bool,
    /// Consecutive failures before a channel's circuit opens.
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker cooldown in seconds.
    pub circuit_breaker_cooldown_secs: u64,
}

impl Default for NotificationServiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            circuit_breaker_threshold: 5,
            circuit_breaker_cooldown_secs: 300,
        }
    }
}

/// Circuit breaker state for a channel.
#[derive(Debug, Clone)]
struct CircuitBreakerState {
    /// Number of consecutive failures.
    failures: u32,
    is_open: bool,
    opened_at: Option<DateTime<Utc>>,
    cooldown: Duration,
}

impl CircuitBreakerState {
    fn new(cooldown_secs: u64) -> Self {
        Self {
            failures: 0,
            is_open: false,
            opened_at: None,
            cooldown: Duration::from_secs(cooldown_secs),
        }
    }

    fn record_failure(&mut self, threshold: u32) {
        self.failures += 1;

        // A failure while half-open restarts the cooldown.
        if self.is_open {
            self.opened_at = Some(Utc::now());
            return;
        }

        if self.failures >= threshold {
            self.is_open = true;
            self.opened_at = Some(Utc::now());
            warn!("Circuit breaker opened after {} failures", self.failures);
        }
    }

    fn record_success(&mut self) {
        self.failures = 0;
        self.is_open = false;
        self.opened_at = None;
    }

    fn is_allowed(&self) -> bool {
        if !self.is_open {
            return true;
        }

        // Half-open once the cooldown has passed.
        if let Some(opened_at) = self.opened_at {
            let elapsed = Utc::now().signed_duration_since(opened_at);
            if elapsed.num_seconds() as u64 >= self.cooldown.as_secs() {
                return true;
            }
        }

        false
    }
}

#[derive(Clone)]
struct RuntimeChannel {
    key: String,
    channel: Arc<dyn NotificationChannel>,
}

/// Delivers notification events to the configured channels.
pub struct NotificationService {
    config: NotificationServiceConfig,
    channels: RwLock<Vec<RuntimeChannel>>,
    circuit_breakers: DashMap<String, CircuitBreakerState>,
    event_tx: broadcast::Sender<NotificationEvent>,
    sent: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl NotificationService {
    pub fn new() -> Self {
        Self::with_config(NotificationServiceConfig::default())
    }

    pub fn with_config(config: NotificationServiceConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BROADCAST_CAPACITY);
        Self {
            config,
            channels: RwLock::new(Vec::new()),
            circuit_breakers: DashMap::new(),
            event_tx,
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    /// Build the service from optional Discord and generic webhook URLs.
    pub fn from_urls(discord_webhook_url: Option<&str>, webhook_url: Option<&str>) -> Self {
        let service = Self::new();
        if let Some(url) = discord_webhook_url {
            service.add_channel(Arc::new(DiscordChannel::new(DiscordConfig::from_url(url))));
        }
        if let Some(url) = webhook_url {
            service.add_channel(Arc::new(WebhookChannel::new(WebhookConfig::from_url(url))));
        }
        service
    }

    /// Add a channel. Channels are keyed by type and position.
    pub fn add_channel(&self, channel: Arc<dyn NotificationChannel>) {
        let mut channels = self.channels.write();
        let key = format!("{}-{}", channel.channel_type(), channels.len());
        self.circuit_breakers.insert(
            key.clone(),
            CircuitBreakerState::new(self.config.circuit_breaker_cooldown_secs),
        );
        info!(channel = %key, enabled = channel.is_enabled(), "Added notification channel");
        channels.push(RuntimeChannel { key, channel });
    }

    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    /// Subscribe to every event passed to [`notify`](Self::notify).
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.event_tx.subscribe()
    }

    /// Send a notification to all enabled channels.
    ///
    /// Channel failures are logged and counted; they never reach the caller.
    pub async fn notify(&self, event: NotificationEvent) {
        if !self.config.enabled {
            return;
        }

        // No receivers is fine.
        let _ = self.event_tx.send(event.clone());

        let channels: Vec<RuntimeChannel> = self
            .channels
            .read()
            .iter()
            .filter(|c| c.channel.is_enabled())
            .cloned()
            .collect();
        if channels.is_empty() {
            return;
        }

        let event = &event;
        join_all(
            channels
                .iter()
                .map(|runtime| self.deliver(runtime, event)),
        )
        .await;
    }

    async fn deliver(&self, runtime: &RuntimeChannel, event: &NotificationEvent) {
        let allowed = self
            .circuit_breakers
            .get(&runtime.key)
            .is_none_or(|cb| cb.is_allowed());
        if !allowed {
            debug!(channel = %runtime.key, "Circuit open, skipping notification");
            self.skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        match runtime.channel.send(event).await {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                if let Some(mut cb) = self.circuit_breakers.get_mut(&runtime.key) {
                    cb.record_success();
                }
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    channel = %runtime.key,
                    event_type = event.event_type(),
                    error = %e,
                    "Failed to deliver notification"
                );
                if let Some(mut cb) = self.circuit_breakers.get_mut(&runtime.key) {
                    cb.record_failure(self.config.circuit_breaker_threshold);
                }
            }
        }
    }

    pub fn stats(&self) -> NotificationStats {
        NotificationStats {
            channel_count: self.channel_count(),
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            circuit_breakers: self
                .circuit_breakers
                .iter()
                .map(|e| (e.key().clone(), e.value().is_open))
                .collect(),
        }
    }
}

impl Default for NotificationService {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the notification service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationStats {
    pub channel_count: usize,
    pub sent: u64,
    pub failed: u64,
    /// Deliveries skipped because the channel's circuit was open.
    pub skipped: u64,
    /// Circuit breaker states (channel_key -> is_open).
    pub circuit_breakers: HashMap<String, bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use std::sync::atomic::AtomicU32;

    struct TestChannel {
        fail: bool,
        attempts: Arc<AtomicU32>,
    }

    #[async_trait::async_trait]
    impl NotificationChannel for TestChannel {
        fn channel_type(&self) -> &'static str {
            "test"
        }

        fn is_enabled(&self) -> bool {
            true
        }

        async fn send(&self, _event: &NotificationEvent) -> Result<()> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                Err(crate::Error::notification(format!("forced failure {}", attempt)))
            } else {
                Ok(())
            }
        }
    }

    fn startup() -> NotificationEvent {
        NotificationEvent::SystemStartup {
            version: "test".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_circuit_breaker_state() {
        let mut cb = CircuitBreakerState::new(300);
        assert!(cb.is_allowed());

        for _ in 0..5 {
            cb.record_failure(5);
        }
        assert!(!cb.is_allowed());

        cb.record_success();
        assert!(cb.is_allowed());
    }

    #[test]
    fn test_from_urls() {
        let service = NotificationService::from_urls(
            Some("https://discord.com/api/webhooks/test"),
            None,
        );
        assert_eq!(service.channel_count(), 1);
        assert_eq!(NotificationService::from_urls(None, None).channel_count(), 0);
    }

    #[tokio::test]
    async fn test_notify_disabled() {
        let service = NotificationService::with_config(NotificationServiceConfig {
            enabled: false,
            ..Default::default()
        });
        let attempts = Arc::new(AtomicU32::new(0));
        service.add_channel(Arc::new(TestChannel {
            fail: false,
            attempts: attempts.clone(),
        }));

        service.notify(startup()).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_channel_is_isolated() {
        let service = NotificationService::new();
        let ok_attempts = Arc::new(AtomicU32::new(0));
        let bad_attempts = Arc::new(AtomicU32::new(0));
        service.add_channel(Arc::new(TestChannel {
            fail: true,
            attempts: bad_attempts.clone(),
        }));
        service.add_channel(Arc::new(TestChannel {
            fail: false,
            attempts: ok_attempts.clone(),
        }));

        let mut rx = service.subscribe();
        service.notify(startup()).await;

        assert_eq!(ok_attempts.load(Ordering::SeqCst), 1);
        assert_eq!(bad_attempts.load(Ordering::SeqCst), 1);
        let stats = service.stats();
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(rx.recv().await.unwrap().event_type(), "system_startup");
    }

    #[tokio::test]
    async fn test_circuit_opens_after_threshold() {
        let service = NotificationService::with_config(NotificationServiceConfig {
            circuit_breaker_threshold: 2,
            ..Default::default()
        });
        let attempts = Arc::new(AtomicU32::new(0));
        service.add_channel(Arc::new(TestChannel {
            fail: true,
            attempts: attempts.clone(),
        }));

        for _ in 0..4 {
            service.notify(startup()).await;
        }

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        let stats = service.stats();
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.circuit_breakers.get("test-0"), Some(&true));
    }
}
