//! Named backends.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use esi_core::{ConfigError, ScopeConfig};

use crate::backend::Backend;
use crate::http_backend::HttpBackend;
use crate::memory::MemoryStore;

/// Backends by name. URL directives use the backend named after their scheme,
/// key directives the scope's key backend.
#[derive(Default)]
pub struct BackendRegistry {
    backends: RwLock<HashMap<String, Arc<dyn Backend>>>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with an HTTP backend under `http` and `https`.
    pub fn with_http() -> Result<Self, ConfigError> {
        let registry = Self::new();
        let http: Arc<dyn Backend> = Arc::new(build_http("http")?);
        registry.register("http", Arc::clone(&http));
        registry.register("https", http);
        Ok(registry)
    }

    /// Build the registry for a scope: the default HTTP backends plus every
    /// backend the scope names.
    pub fn from_scope(scope: &ScopeConfig) -> Result<Self, ConfigError> {
        let registry = Self::with_http()?;
        for (name, url) in &scope.backends {
            registry.register(name.clone(), backend_from_url(name, url)?);
        }
        Ok(registry)
    }

    /// Add a backend. An existing backend with the same name is replaced and returned.
    pub fn register(
        &self,
        name: impl Into<String>,
        backend: Arc<dyn Backend>,
    ) -> Option<Arc<dyn Backend>> {
        let name = name.into();
        let previous = self
            .backends
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), backend);
        if previous.is_some() {
            tracing::debug!(backend = %name, "replaced registered backend");
        }
        previous
    }

    /// Find a backend by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Backend>> {
        self.backends
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Registered names with their backend kind, sorted by name.
    pub fn describe(&self) -> Vec<(String, &'static str)> {
        let backends = self.backends.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<_> = backends
            .iter()
            .map(|(name, backend)| (name.clone(), backend.kind()))
            .collect();
        entries.sort();
        entries
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.backends
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no backend is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.describe())
            .finish()
    }
}

/// Build a backend from a configured URL.
///
/// `http://` and `https://` give an HTTP backend resolving keys against the URL,
/// `memory://` an empty in-process store.
pub fn backend_from_url(name: &str, url: &str) -> Result<Arc<dyn Backend>, ConfigError> {
    let Some((scheme, _)) = url.split_once("://") else {
        return Err(ConfigError::InvalidBackendUrl {
            name: name.to_string(),
            url: url.to_string(),
        });
    };

    match scheme.to_ascii_lowercase().as_str() {
        "http" | "https" => Ok(Arc::new(build_http(name)?.with_base_url(url))),
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "" => Err(ConfigError::InvalidBackendUrl {
            name: name.to_string(),
            url: url.to_string(),
        }),
        other => Err(ConfigError::UnsupportedBackend {
            name: name.to_string(),
            scheme: other.to_string(),
        }),
    }
}

fn build_http(name: &str) -> Result<HttpBackend, ConfigError> {
    HttpBackend::new().map_err(|e| ConfigError::BackendInit {
        name: name.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{backend_fn, FetchRequest, FetchResponse, ResourceRef};
    use http::HeaderMap;
    use std::time::Duration;

    fn constant(body: &'static str) -> Arc<dyn Backend> {
        Arc::new(backend_fn(move |_req: FetchRequest| async move {
            Ok(FetchResponse::ok(body))
        }))
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let registry = BackendRegistry::new();
        assert!(registry.register("backend", constant("first")).is_none());
        assert!(registry.register("backend", constant("second")).is_some());
        assert_eq!(registry.len(), 1);

        let backend = registry.lookup("backend").unwrap();
        let resp = backend
            .fetch(FetchRequest::new(
                ResourceRef::Key("k".to_string()),
                HeaderMap::new(),
                Duration::from_secs(1),
            ))
            .await
            .unwrap();
        assert_eq!(&resp.content[..], b"second");
    }

    #[test]
    fn test_lookup_missing() {
        assert!(BackendRegistry::new().lookup("nope").is_none());
    }

    #[test]
    fn test_with_http() {
        let registry = BackendRegistry::with_http().unwrap();
        assert_eq!(
            registry.describe(),
            vec![("http".to_string(), "http"), ("https".to_string(), "http")]
        );
    }

    #[test]
    fn test_from_scope() {
        let scope = ScopeConfig::new("/")
            .with_backend("backend", "memory://")
            .with_backend("kv", "https://kv.service/items");
        let registry = BackendRegistry::from_scope(&scope).unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.lookup("backend").unwrap().kind(), "memory");
        assert_eq!(registry.lookup("kv").unwrap().kind(), "http");
    }

    #[test]
    fn test_unsupported_scheme() {
        let scope = ScopeConfig::new("/").with_backend("backend", "redis://localhost:6379/0");
        let err = BackendRegistry::from_scope(&scope).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnsupportedBackend { ref scheme, .. } if scheme == "redis"
        ));
        assert_eq!(err.kind(), esi_core::ErrorKind::Configuration);
    }

    #[test]
    fn test_invalid_url() {
        for url in ["localhost:6379", "://nohost"] {
            assert!(
                matches!(
                    backend_from_url("backend", url),
                    Err(ConfigError::InvalidBackendUrl { .. })
                ),
                "{}",
                url
            );
        }
    }
}
