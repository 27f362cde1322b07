//! In-process key-value backend.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use crate::backend::{Backend, FetchRequest, FetchResponse, ResourceRef};
use crate::error::FetchError;

/// Key-value store held in memory. Answers `key=` directives only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    /// Remove a value.
    pub fn remove(&self, key: &str) -> Option<Bytes> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Backend for MemoryStore {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        match &request.resource {
            ResourceRef::Key(key) => self
                .get(key)
                .map(FetchResponse::ok)
                .ok_or_else(|| FetchError::NotFound(key.clone())),
            ResourceRef::Url(url) => Err(FetchError::Unsupported(format!(
                "memory store cannot fetch URL {}",
                url
            ))),
        }
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;
    use std::time::Duration;

    fn key_request(key: &str) -> FetchRequest {
        FetchRequest::new(
            ResourceRef::Key(key.to_string()),
            HeaderMap::new(),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_key_lookup() {
        let store = MemoryStore::new();
        store.insert("product_234234", "<p>product</p>");

        let resp = store.fetch(key_request("product_234234")).await.unwrap();
        assert_eq!(&resp.content[..], b"<p>product</p>");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = MemoryStore::new();
        let err = store.fetch(key_request("nope")).await.unwrap_err();
        assert_eq!(err, FetchError::NotFound("nope".to_string()));
    }

    #[tokio::test]
    async fn test_url_unsupported() {
        let store = MemoryStore::new();
        let req = FetchRequest::new(
            ResourceRef::Url("http://a/".to_string()),
            HeaderMap::new(),
            Duration::from_secs(1),
        );
        assert!(matches!(
            store.fetch(req).await.unwrap_err(),
            FetchError::Unsupported(_)
        ));
    }

    #[test]
    fn test_insert_replace_remove() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        store.insert("k", "v1");
        store.insert("k", "v2");
        assert_eq!(store.get("k").unwrap(), Bytes::from("v2"));
        assert_eq!(store.remove("k").unwrap(), Bytes::from("v2"));
        assert!(store.is_empty());
    }
}
