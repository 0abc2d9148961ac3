use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use super::events::NotificationEvent;
use super::service::NotificationService;
use crate::Error;
use crate::update::{ErrorReporter, TracingReporter};

/// Logs every failure and forwards non-transient ones to the notification
/// channels.
pub struct NotifyingReporter {
    notifications: Arc<NotificationService>,
    log: TracingReporter,
}

impl NotifyingReporter {
    pub fn new(notifications: Arc<NotificationService>) -> Self {
        Self {
            notifications,
            log: TracingReporter,
        }
    }
}

impl ErrorReporter for NotifyingReporter {
    fn report(&self, error: &Error, context: &str) {
        self.log.report(error, context);
        if error.is_transient_fetch() {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(context = %context, "No runtime, dropping error notification");
            return;
        };

        let event = NotificationEvent::ErrorReported {
            context: context.to_string(),
            message: error.to_string(),
            timestamp: Utc::now(),
        };
        let notifications = Arc::clone(&self.notifications);
        handle.spawn(async move {
            notifications.notify(event).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forwards_non_transient_errors() {
        let notifications = Arc::new(NotificationService::new());
        let mut rx = notifications.subscribe();
        let reporter = NotifyingReporter::new(notifications.clone());

        reporter.report(
            &Error::consumer("tokens", "store offline"),
            "consumer/tokens/uuid-1",
        );

        let event = rx.recv().await.unwrap();
        match event {
            NotificationEvent::ErrorReported { context, message, .. } => {
                assert_eq!(context, "consumer/tokens/uuid-1");
                assert!(message.contains("store offline"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_skips_transient_errors() {
        let notifications = Arc::new(NotificationService::new());
        let mut rx = notifications.subscribe();
        let reporter = NotifyingReporter::new(notifications.clone());

        reporter.report(
            &Error::from(hive_api::ApiError::Status {
                status: 503,
                url: "u".to_string(),
            }),
            "player/uuid-1",
        );
        tokio::task::yield_now().await;

        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }
}
