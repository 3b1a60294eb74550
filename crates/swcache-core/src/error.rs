use thiserror::Error;

use crate::sync::SyncError;

pub type Result<T> = std::result::Result<T, WorkerError>;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to fetch static asset {url}: {reason}")]
    AssetFetch { url: String, reason: String },

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Cache storage failure: {0}")]
    CacheStorage(String),

    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Host operation failed: {0}")]
    Host(String),
}

/// Maximum length for response bodies quoted in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl WorkerError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        WorkerError::CacheStorage(err.to_string())
    }

    pub fn is_network(&self) -> bool {
        matches!(self, WorkerError::NetworkUnavailable(_))
    }
}

impl From<std::io::Error> for WorkerError {
    fn from(err: std::io::Error) -> Self {
        WorkerError::CacheStorage(err.to_string())
    }
}
