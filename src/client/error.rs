// src/client/error.rs

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

/// Failures seen by the client library.
///
/// `NotFound` and `Validation` are logical errors and surface immediately;
/// `Timeout` and `Transient` are retried with backoff before surfacing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Transient(String),
}

impl ClientError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Timeout | ClientError::Transient(_))
    }

    /// Classifies a non-success HTTP status.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            404 => ClientError::NotFound(message),
            400 | 422 => ClientError::Validation(message),
            _ => ClientError::Transient(format!("HTTP {}: {}", status, message)),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Transient(err.to_string())
        }
    }
}
