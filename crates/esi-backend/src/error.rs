//! Fetch errors.

use std::time::Duration;

use esi_core::ErrorKind;

/// Error type for a single backend attempt.
///
/// `Clone` so one result can be handed to every caller waiting on the same fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP error: {status} for {resource}")]
    Status { status: u16, resource: String },

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("No backend registered under {0:?}")]
    UnknownBackend(String),

    #[error("Unsupported resource: {0}")]
    Unsupported(String),

    #[error("Request error: {0}")]
    Request(String),
}

impl FetchError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Fetch
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}
