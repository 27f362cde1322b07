//! Cache stores per scope.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use esi_core::ConfigError;

use crate::store::{cache_from_url, CacheStore};

/// Maps a scope to its cache stores. A scope with no stores does not cache.
#[derive(Default)]
pub struct ScopeCacheRegistry {
    scopes: RwLock<HashMap<String, Vec<Arc<dyn CacheStore>>>>,
}

impl ScopeCacheRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a store to a scope. Stores are consulted in registration order.
    pub fn register(&self, scope: impl Into<String>, store: Arc<dyn CacheStore>) {
        let scope = scope.into();
        tracing::debug!(scope = %scope, kind = store.kind(), "registered cache store");
        self.scopes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(scope)
            .or_default()
            .push(store);
    }

    /// Add a store built from a cache URL.
    pub fn register_url(&self, scope: impl Into<String>, url: &str) -> Result<(), ConfigError> {
        let store = cache_from_url(url)?;
        self.register(scope, store);
        Ok(())
    }

    /// Stores of a scope, in registration order.
    pub fn stores(&self, scope: &str) -> Vec<Arc<dyn CacheStore>> {
        self.scopes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(scope)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of stores of a scope.
    pub fn store_count(&self, scope: &str) -> usize {
        self.scopes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(scope)
            .map_or(0, Vec::len)
    }

    /// Live entries across a scope's stores. Unreachable stores count as empty.
    pub async fn len(&self, scope: &str) -> usize {
        let mut total = 0;
        for store in self.stores(scope) {
            match store.len().await {
                Ok(n) => total += n,
                Err(e) => tracing::warn!(scope = %scope, error = %e, "cache store len failed"),
            }
        }
        total
    }

    /// Remove every entry from every store.
    pub async fn clear(&self) {
        let stores: Vec<_> = self
            .scopes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .flatten()
            .cloned()
            .collect();
        for store in stores {
            if let Err(e) = store.clear().await {
                tracing::warn!(error = %e, "cache store clear failed");
            }
        }
    }
}

impl std::fmt::Debug for ScopeCacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scopes = self.scopes.read().unwrap_or_else(PoisonError::into_inner);
        let mut counts: Vec<_> = scopes.iter().map(|(s, v)| (s.clone(), v.len())).collect();
        counts.sort();
        f.debug_struct("ScopeCacheRegistry")
            .field("scopes", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{CacheEntry, Fragment};
    use crate::signature::Signature;
    use crate::store::MemoryCache;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_len_and_clear() {
        let registry = ScopeCacheRegistry::new();
        registry.register_url("/catalog", "memory://").unwrap();
        assert_eq!(registry.store_count("/catalog"), 1);
        assert_eq!(registry.store_count("/checkout"), 0);

        let store = registry.stores("/catalog").remove(0);
        store
            .set(CacheEntry::new(
                Signature::from_components(vec!["a".to_string()]),
                Fragment::new("a"),
                Instant::now() + Duration::from_secs(60),
            ))
            .await
            .unwrap();
        assert_eq!(registry.len("/catalog").await, 1);
        assert_eq!(registry.len("/checkout").await, 0);

        registry.clear().await;
        assert_eq!(registry.len("/catalog").await, 0);
    }

    #[test]
    fn test_unsupported_url() {
        let registry = ScopeCacheRegistry::new();
        let err = registry.register_url("/", "redis://localhost").unwrap_err();
        assert_eq!(err.kind(), esi_core::ErrorKind::Configuration);
        assert_eq!(registry.store_count("/"), 0);
    }

    #[test]
    fn test_registration_order() {
        let registry = ScopeCacheRegistry::new();
        let first: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        registry.register("/", Arc::clone(&first));
        registry.register("/", Arc::new(MemoryCache::new()));
        let stores = registry.stores("/");
        assert_eq!(stores.len(), 2);
        assert!(Arc::ptr_eq(&stores[0], &first));
    }
}
