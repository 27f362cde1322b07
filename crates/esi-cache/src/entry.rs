//! Cached fragments and cache errors.

use bytes::Bytes;
use esi_core::ErrorKind;
use http::HeaderMap;
use tokio::time::Instant;

use crate::signature::Signature;

/// Result type for cache store operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache store errors. Never fatal: reads treat them as a miss, writes ignore them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// Backend storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// The store cannot be reached.
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

impl CacheError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::CacheBackend
    }
}

/// Resolved content of one directive together with its returned headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub content: Bytes,
    pub headers: HeaderMap,
}

impl Fragment {
    /// A fragment without headers.
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self {
            content: content.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Set the returned headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// A stored fragment.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub signature: Signature,
    pub fragment: Fragment,
    pub expires_at: Instant,
}

impl CacheEntry {
    /// Create an entry expiring at `expires_at`.
    pub fn new(signature: Signature, fragment: Fragment, expires_at: Instant) -> Self {
        Self {
            signature,
            fragment,
            expires_at,
        }
    }

    /// Whether the entry is past its expiry.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Whether the entry is expired at `now`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}
