//! Lookup and fill across a scope's stores.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::entry::{CacheEntry, Fragment};
use crate::registry::ScopeCacheRegistry;
use crate::signature::Signature;

/// Cache policy in front of the scope registry.
///
/// Reads try stores in order and return the first live hit. Writes go to every
/// store. Store errors are logged and never surface.
#[derive(Debug, Clone)]
pub struct CacheLayer {
    registry: Arc<ScopeCacheRegistry>,
}

impl CacheLayer {
    /// Create a layer over `registry`.
    pub fn new(registry: Arc<ScopeCacheRegistry>) -> Self {
        Self { registry }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Arc<ScopeCacheRegistry> {
        &self.registry
    }

    /// Look up a live entry.
    pub async fn get(&self, scope: &str, signature: &Signature) -> Option<CacheEntry> {
        for store in self.registry.stores(scope) {
            match store.get(signature).await {
                Ok(Some(entry)) if !entry.is_expired() => return Some(entry),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(scope = %scope, signature = %signature, error = %e, "cache read failed");
                }
            }
        }
        None
    }

    /// Store a fragment for `ttl`. A zero TTL stores nothing.
    pub async fn set(&self, scope: &str, signature: &Signature, fragment: Fragment, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let stores = self.registry.stores(scope);
        if stores.is_empty() {
            return;
        }

        let entry = CacheEntry::new(signature.clone(), fragment, Instant::now() + ttl);
        for store in stores {
            if let Err(e) = store.set(entry.clone()).await {
                tracing::warn!(scope = %scope, signature = %signature, error = %e, "cache write failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{CacheError, CacheResult};
    use crate::store::{CacheStore, MemoryCache};
    use async_trait::async_trait;

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _signature: &Signature) -> CacheResult<Option<CacheEntry>> {
            Err(CacheError::Unavailable("down".to_string()))
        }
        async fn set(&self, _entry: CacheEntry) -> CacheResult<()> {
            Err(CacheError::Unavailable("down".to_string()))
        }
        async fn len(&self) -> CacheResult<usize> {
            Err(CacheError::Unavailable("down".to_string()))
        }
        async fn clear(&self) -> CacheResult<()> {
            Ok(())
        }
    }

    fn sig() -> Signature {
        Signature::from_components(vec!["scope:/".to_string(), "src:https://a/".to_string()])
    }

    fn memory() -> Arc<dyn CacheStore> {
        Arc::new(MemoryCache::new())
    }

    fn layer_with(stores: Vec<Arc<dyn CacheStore>>) -> CacheLayer {
        let registry = Arc::new(ScopeCacheRegistry::new());
        for store in stores {
            registry.register("/", store);
        }
        CacheLayer::new(registry)
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_and_expiry() {
        let layer = layer_with(vec![memory()]);
        layer.set("/", &sig(), Fragment::new("cart"), Duration::from_secs(5)).await;

        let hit = layer.get("/", &sig()).await.unwrap();
        assert_eq!(&hit.fragment.content[..], b"cart");

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(layer.get("/", &sig()).await.is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_is_noop() {
        let layer = layer_with(vec![memory()]);
        layer.set("/", &sig(), Fragment::new("cart"), Duration::ZERO).await;
        assert!(layer.get("/", &sig()).await.is_none());
        assert_eq!(layer.registry().len("/").await, 0);
    }

    #[tokio::test]
    async fn test_scope_without_stores() {
        let layer = layer_with(Vec::new());
        layer.set("/", &sig(), Fragment::new("cart"), Duration::from_secs(5)).await;
        assert!(layer.get("/", &sig()).await.is_none());
    }

    #[tokio::test]
    async fn test_broken_store_is_a_miss() {
        let broken: Arc<dyn CacheStore> = Arc::new(BrokenStore);
        let layer = layer_with(vec![broken, memory()]);
        layer.set("/", &sig(), Fragment::new("cart"), Duration::from_secs(5)).await;

        let hit = layer.get("/", &sig()).await.unwrap();
        assert_eq!(&hit.fragment.content[..], b"cart");
    }

    #[tokio::test]
    async fn test_writes_go_to_every_store() {
        let a = memory();
        let b = memory();
        let layer = layer_with(vec![Arc::clone(&a), Arc::clone(&b)]);
        layer.set("/", &sig(), Fragment::new("cart"), Duration::from_secs(5)).await;
        assert_eq!(a.len().await.unwrap(), 1);
        assert_eq!(b.len().await.unwrap(), 1);
    }
}
