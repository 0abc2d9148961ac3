//! Notification events.
//!
//! Defines the events that can trigger notifications and their priority levels.

use chrono::{DateTime, Utc};
use hive_api::{PlayerId, Rank};
use serde::{Deserialize, Serialize};

/// Priority level for notifications.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum NotificationPriority {
    /// Informational only.
    Low,
    #[default]
    Normal,
    High,
    /// Requires immediate attention.
    Critical,
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Events that can trigger notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NotificationEvent {
    /// A player's rank changed since it was last seen.
    RankChanged {
        player: PlayerId,
        player_name: String,
        old_rank: Rank,
        new_rank: Rank,
        timestamp: DateTime<Utc>,
    },
    /// A fetch or consumer failure was reported.
    ErrorReported {
        context: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    SystemStartup {
        version: String,
        timestamp: DateTime<Utc>,
    },
    SystemShutdown {
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl NotificationEvent {
    pub fn rank_changed(
        player: PlayerId,
        player_name: String,
        old_rank: Rank,
        new_rank: Rank,
    ) -> Self {
        Self::RankChanged {
            player,
            player_name,
            old_rank,
            new_rank,
            timestamp: Utc::now(),
        }
    }

    /// Get the priority of this event.
    pub fn priority(&self) -> NotificationPriority {
        match self {
            Self::RankChanged {
                old_rank, new_rank, ..
            } => {
                if old_rank.is_staff() || new_rank.is_staff() {
                    NotificationPriority::High
                } else {
                    NotificationPriority::Normal
                }
            }
            Self::ErrorReported { .. } => NotificationPriority::High,
            Self::SystemStartup { .. } => NotificationPriority::Normal,
            Self::SystemShutdown { .. } => NotificationPriority::Normal,
        }
    }

    /// Get the event type as a string.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RankChanged { .. } => "rank_changed",
            Self::ErrorReported { .. } => "error_reported",
            Self::SystemStartup { .. } => "system_startup",
            Self::SystemShutdown { .. } => "system_shutdown",
        }
    }

    /// Get a human-readable title for this event.
    pub fn title(&self) -> String {
        match self {
            Self::RankChanged { new_rank, old_rank, .. } => {
                if new_rank.is_staff() && !old_rank.is_staff() {
                    format!("New {}", new_rank)
                } else if old_rank.is_staff() && !new_rank.is_staff() {
                    format!("A {} left the Team", old_rank)
                } else {
                    "Rank changed".to_string()
                }
            }
            Self::ErrorReported { context, .. } => format!("Update failure in {}", context),
            Self::SystemStartup { version, .. } => format!("Updater started (v{})", version),
            Self::SystemShutdown { reason, .. } => format!("Updater shutting down: {}", reason),
        }
    }

    /// Get a detailed description of this event.
    pub fn description(&self) -> String {
        match self {
            Self::RankChanged {
                player_name,
                old_rank,
                new_rank,
                ..
            } => {
                if old_rank.is_staff() && !new_rank.is_staff() {
                    format!("{} is no longer a {}", player_name, old_rank)
                } else {
                    format!("{} is now a {} (was {})", player_name, new_rank, old_rank)
                }
            }
            Self::ErrorReported { message, .. } => message.clone(),
            Self::SystemStartup { .. } => "Update coordinator initialized".to_string(),
            Self::SystemShutdown { reason, .. } => reason.clone(),
        }
    }

    /// Get the timestamp of this event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::RankChanged { timestamp, .. }
            | Self::ErrorReported { timestamp, .. }
            | Self::SystemStartup { timestamp, .. }
            | Self::SystemShutdown { timestamp, .. } => *timestamp,
        }
    }

    /// Player the event is about, if any.
    pub fn player(&self) -> Option<&PlayerId> {
        match self {
            Self::RankChanged { player, .. } => Some(player),
            _ => None,
        }
    }
}
