//! Scope selection and per-scope wiring.

use std::sync::Arc;

use bytes::Bytes;
use esi_backend::BackendRegistry;
use esi_cache::{CacheLayer, ScopeCacheRegistry};
use esi_core::{ConfigError, EsiConfig, ScopeConfig};
use esi_observability::ScopeLogger;
use http::{HeaderMap, Method};
use tracing::instrument::WithSubscriber;

use crate::assembler::{Assembled, PageAssembler};
use crate::resolver::{FetchFlights, ResourceResolver};

/// Everything one scope needs to assemble pages.
#[derive(Debug)]
pub struct ScopeRuntime {
    config: Arc<ScopeConfig>,
    backends: Arc<BackendRegistry>,
    assembler: PageAssembler,
    logger: ScopeLogger,
}

impl ScopeRuntime {
    /// The scope's settings.
    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    /// The scope's backends. Register further backends here.
    pub fn backends(&self) -> &Arc<BackendRegistry> {
        &self.backends
    }

    /// The scope's assembler.
    pub fn assembler(&self) -> &PageAssembler {
        &self.assembler
    }

    /// The scope's log destination.
    pub fn logger(&self) -> &ScopeLogger {
        &self.logger
    }
}

/// Result of running a response body through the middleware.
#[derive(Debug, Clone)]
pub enum Processed {
    /// No scope matched or the method is not assembled; the body is untouched.
    Passthrough(Bytes),
    /// The body was assembled.
    Assembled(Assembled),
}

impl Processed {
    /// The body to send to the client.
    pub fn into_body(self) -> Bytes {
        match self {
            Self::Passthrough(body) => body,
            Self::Assembled(assembled) => assembled.body,
        }
    }
}

/// ESI processing for every configured scope.
///
/// The cache registry and the single-flight table are shared by all scopes.
#[derive(Debug)]
pub struct EsiMiddleware {
    scopes: Vec<ScopeRuntime>,
    caches: Arc<ScopeCacheRegistry>,
}

impl EsiMiddleware {
    /// Build every scope. All configuration errors surface here.
    pub fn from_config(config: &EsiConfig) -> Result<Self, ConfigError> {
        let caches = Arc::new(ScopeCacheRegistry::new());
        let flights = Arc::new(FetchFlights::new());

        let mut scopes = Vec::with_capacity(config.scopes.len());
        for scope in &config.scopes {
            let logger = ScopeLogger::from_scope(scope)?;
            let backends = Arc::new(BackendRegistry::from_scope(scope)?);
            for url in &scope.caches {
                caches.register_url(scope.scope.clone(), url)?;
            }

            let scope = Arc::new(scope.clone());
            let resolver = ResourceResolver::new(
                Arc::clone(&scope),
                Arc::clone(&backends),
                CacheLayer::new(Arc::clone(&caches)),
                Arc::clone(&flights),
            );
            tracing::debug!(
                scope = %scope.scope,
                backends = backends.len(),
                caches = caches.store_count(&scope.scope),
                "scope ready"
            );

            scopes.push(ScopeRuntime {
                config: scope,
                backends,
                assembler: PageAssembler::new(resolver),
                logger,
            });
        }

        Ok(Self { scopes, caches })
    }

    /// Every scope, in configuration order.
    pub fn scopes(&self) -> &[ScopeRuntime] {
        &self.scopes
    }

    /// The scope with the longest prefix matching `path`.
    pub fn scope(&self, path: &str) -> Option<&ScopeRuntime> {
        self.scopes
            .iter()
            .filter(|s| s.config.matches(path))
            .max_by_key(|s| s.config.scope.len())
    }

    /// Backends of the scope matching `path`.
    pub fn backends(&self, path: &str) -> Option<&Arc<BackendRegistry>> {
        self.scope(path).map(ScopeRuntime::backends)
    }

    /// The shared cache registry.
    pub fn caches(&self) -> &Arc<ScopeCacheRegistry> {
        &self.caches
    }

    /// Assemble a response body for a request, or pass it through.
    pub async fn process(
        &self,
        method: &Method,
        path: &str,
        request_headers: &HeaderMap,
        body: Bytes,
    ) -> Processed {
        let Some(runtime) = self.scope(path) else {
            return Processed::Passthrough(body);
        };
        if !runtime.config.method_allowed(method.as_str()) {
            return Processed::Passthrough(body);
        }

        let mut assembled = runtime
            .assembler
            .assemble(&body, request_headers)
            .with_subscriber(runtime.logger.dispatch().clone())
            .await;
        assembled.metrics.page_id = runtime.config.page_id(path, request_headers);
        Processed::Assembled(assembled)
    }
}
