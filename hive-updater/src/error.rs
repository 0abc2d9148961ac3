//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Fetch error: {0}")]
    Fetch(#[from] hive_api::ApiError),

    #[error("Consumer '{consumer}' failed: {message}")]
    Consumer { consumer: String, message: String },

    #[error("Storage error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn consumer(consumer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Consumer {
            consumer: consumer.into(),
            message: message.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    /// Transient upstream failures are expected during normal polling and
    /// are fixed by the next fetch cycle.
    pub fn is_transient_fetch(&self) -> bool {
        matches!(self, Self::Fetch(e) if e.is_transient())
    }
}
