//! HTTP backend.

use std::time::Duration;

use async_trait::async_trait;
use http::HeaderMap;
use reqwest::Client;

use crate::backend::{Backend, FetchRequest, FetchResponse, ResourceRef};
use crate::error::FetchError;

const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const POOL_MAX_IDLE_PER_HOST: usize = 10;

/// Request headers never copied onto a backend request.
const HOP_BY_HOP: [&str; 10] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// Drop hop-by-hop headers and those naming the client's own request.
pub fn outbound_headers(mut headers: HeaderMap) -> HeaderMap {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers
}

/// Fetches URLs with `GET`. With a base URL it also answers key lookups
/// by fetching `<base>/<key>`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Option<String>,
}

impl HttpBackend {
    /// Build a backend with a pooled client.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client))
    }

    /// Use an existing client.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            base_url: None,
        }
    }

    /// Resolve keys against `base_url`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// The URL a resource is fetched from.
    pub fn url_for(&self, resource: &ResourceRef) -> Result<String, FetchError> {
        match resource {
            ResourceRef::Url(url) => Ok(url.clone()),
            ResourceRef::Key(key) => match &self.base_url {
                Some(base) => Ok(format!("{}/{}", base.trim_end_matches('/'), key)),
                None => Err(FetchError::Unsupported(format!(
                    "HTTP backend without base URL cannot look up key {}",
                    key
                ))),
            },
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let url = self.url_for(&request.resource)?;
        let remaining = request.remaining();
        if remaining.is_zero() {
            return Err(FetchError::Timeout(Duration::ZERO));
        }

        let response = self
            .client
            .get(&url)
            .headers(outbound_headers(request.headers))
            .timeout(remaining)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(remaining)
                } else {
                    e.into()
                }
            })?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let content = response.bytes().await?;
        tracing::debug!(url = %url, status, bytes = content.len(), "fetched");

        Ok(FetchResponse {
            status,
            content,
            headers,
        })
    }

    fn kind(&self) -> &'static str {
        "http"
    }
}
