//! Cache stores.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use esi_core::ConfigError;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::entry::{CacheEntry, CacheResult};
use crate::signature::Signature;

/// A TTL store of fragments.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a live entry. Expired entries are treated as absent.
    async fn get(&self, signature: &Signature) -> CacheResult<Option<CacheEntry>>;

    /// Store an entry, replacing any previous one with the same signature.
    async fn set(&self, entry: CacheEntry) -> CacheResult<()>;

    /// Number of live entries.
    async fn len(&self) -> CacheResult<usize>;

    /// Remove every entry.
    async fn clear(&self) -> CacheResult<()>;

    /// Short label for diagnostics.
    fn kind(&self) -> &'static str {
        "custom"
    }
}

/// In-memory cache store. Expired entries are evicted when they are looked up
/// or counted; there is no background sweep.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<Signature, CacheEntry>>,
}

impl MemoryCache {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, signature: &Signature) -> CacheResult<Option<CacheEntry>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(signature) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired_at(now) => return Ok(Some(entry.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(signature)
            .is_some_and(|entry| entry.is_expired_at(now))
        {
            entries.remove(signature);
        }
        Ok(None)
    }

    async fn set(&self, entry: CacheEntry) -> CacheResult<()> {
        self.entries
            .write()
            .await
            .insert(entry.signature.clone(), entry);
        Ok(())
    }

    async fn len(&self) -> CacheResult<usize> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| !entry.is_expired_at(now));
        Ok(entries.len())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.entries.write().await.clear();
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

/// Build a store from a configured cache URL. Only `memory://` is supported.
pub fn cache_from_url(url: &str) -> Result<Arc<dyn CacheStore>, ConfigError> {
    match url.split_once("://") {
        Some((scheme, _)) if scheme.eq_ignore_ascii_case("memory") => {
            Ok(Arc::new(MemoryCache::new()))
        }
        _ => Err(ConfigError::UnsupportedCache(url.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Fragment;
    use std::time::Duration;

    fn entry(name: &str, ttl: Duration) -> CacheEntry {
        CacheEntry::new(
            Signature::from_components(vec![name.to_string()]),
            Fragment::new(name.to_string()),
            Instant::now() + ttl,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_set() {
        let store = MemoryCache::new();
        let e = entry("a", Duration::from_secs(10));
        store.set(e.clone()).await.unwrap();

        let hit = store.get(&e.signature).await.unwrap().unwrap();
        assert_eq!(hit.fragment, e.fragment);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_expiry() {
        let store = MemoryCache::new();
        let e = entry("a", Duration::from_secs(10));
        store.set(e.clone()).await.unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(store.get(&e.signature).await.unwrap().is_none());
        assert_eq!(store.entries.read().await.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_len_skips_expired() {
        let store = MemoryCache::new();
        store.set(entry("short", Duration::from_secs(1))).await.unwrap();
        store.set(entry("long", Duration::from_secs(60))).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 2);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.len().await.unwrap(), 1);

        store.clear().await.unwrap();
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[test]
    fn test_cache_from_url() {
        assert_eq!(cache_from_url("memory://").unwrap().kind(), "memory");
        assert_eq!(cache_from_url("MEMORY://local").unwrap().kind(), "memory");
        for url in ["redis://localhost:6379/0", "memory", ""] {
            assert!(matches!(
                cache_from_url(url),
                Err(ConfigError::UnsupportedCache(_))
            ));
        }
    }
}
