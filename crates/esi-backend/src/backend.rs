//! The backend capability.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use tokio::time::Instant;

use crate::error::FetchError;

/// What a backend is asked to produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    /// Fetch a URL.
    Url(String),
    /// Look up a key.
    Key(String),
}

impl ResourceRef {
    /// The URL or key.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Url(s) | Self::Key(s) => s,
        }
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{}", url),
            Self::Key(key) => write!(f, "key:{}", key),
        }
    }
}

/// One backend attempt.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// What to fetch.
    pub resource: ResourceRef,
    /// Forwarded request headers.
    pub headers: HeaderMap,
    /// The attempt is abandoned at this instant.
    pub deadline: Instant,
}

impl FetchRequest {
    /// Create a request with a deadline `timeout` from now.
    pub fn new(resource: ResourceRef, headers: HeaderMap, timeout: Duration) -> Self {
        Self {
            resource,
            headers,
            deadline: Instant::now() + timeout,
        }
    }

    /// Time left before the deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// A backend's answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub content: Bytes,
    pub headers: HeaderMap,
}

impl FetchResponse {
    /// A `200` response with the given body.
    pub fn ok(content: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            content: content.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Set the status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set the response headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// Something that can produce fragment content.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Run one attempt. Implementations may ignore the deadline; callers enforce it.
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError>;

    /// Short label for diagnostics.
    fn kind(&self) -> &'static str {
        "custom"
    }
}

/// Adapter turning an async closure into a [`Backend`].
pub struct FnBackend<F> {
    f: F,
}

/// Wrap an async closure as a backend.
pub fn backend_fn<F, Fut>(f: F) -> FnBackend<F>
where
    F: Fn(FetchRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<FetchResponse, FetchError>> + Send + 'static,
{
    FnBackend { f }
}

#[async_trait]
impl<F, Fut> Backend for FnBackend<F>
where
    F: Fn(FetchRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<FetchResponse, FetchError>> + Send + 'static,
{
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        (self.f)(request).await
    }

    fn kind(&self) -> &'static str {
        "function"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_backend() {
        let backend = backend_fn(|req: FetchRequest| async move {
            Ok(FetchResponse::ok(format!("hello {}", req.resource.as_str())))
        });
        let resp = backend
            .fetch(FetchRequest::new(
                ResourceRef::Key("world".to_string()),
                HeaderMap::new(),
                Duration::from_secs(1),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(&resp.content[..], b"hello world");
        assert_eq!(backend.kind(), "function");
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining() {
        let req = FetchRequest::new(
            ResourceRef::Url("http://a/".to_string()),
            HeaderMap::new(),
            Duration::from_millis(100),
        );
        assert_eq!(req.remaining(), Duration::from_millis(100));
        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(req.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_resource_display() {
        assert_eq!(ResourceRef::Key("k".to_string()).to_string(), "key:k");
        assert_eq!(ResourceRef::Url("http://a/".to_string()).to_string(), "http://a/");
    }
}
