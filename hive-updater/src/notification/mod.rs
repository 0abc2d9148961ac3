//! Notification system.
//!
//! Rank changes and update failures are delivered to external channels
//! (Discord webhooks, generic JSON webhooks).

pub mod channels;
pub mod events;
mod reporter;
pub mod service;

pub use channels::{
    DiscordChannel, DiscordConfig, NotificationChannel, WebhookChannel, WebhookConfig,
};
pub use events::{NotificationEvent, NotificationPriority};
pub use reporter::NotifyingReporter;
pub use service::{NotificationService, NotificationServiceConfig, NotificationStats};
