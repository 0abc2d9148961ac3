use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("not found: {url}")]
    NotFound { url: String },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Whether the failure is a transient fetch problem (network, timeout,
    /// upstream overload) that the next polling cycle is expected to fix.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Json(_) | Self::NotFound { .. } | Self::InvalidUrl(_) => false,
        }
    }
}
