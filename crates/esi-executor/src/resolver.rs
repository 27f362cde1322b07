//! Resolution of a single directive.
//!
//! `CacheCheck -> (hit: Done) | (miss: Fetching) -> (success: CacheWrite -> Done) | (exhausted: Fallback) -> Done`

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use esi_backend::{
    fetch_with_deadline, BackendRegistry, FetchError, FetchRequest, FetchResponse, ResourceRef,
};
use esi_cache::{CacheLayer, Fragment, Signature, SingleFlight};
use esi_core::{select_forward, select_return, Directive, ScopeConfig};
use http::HeaderMap;

use crate::fallback::select_fallback;

/// How a directive was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Served from the cache.
    Cached,
    /// Fetched from the alternative at this index.
    Fetched { alternative: usize },
    /// Fallback content.
    Fallback,
    /// Nothing to insert.
    Empty,
}

/// Content and returned headers for one directive.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub content: Bytes,
    pub headers: HeaderMap,
    pub outcome: Outcome,
}

/// Result of a fetch shared between every caller waiting on the same signature.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub fragment: Fragment,
    /// Index of the alternative that succeeded.
    pub alternative: usize,
    /// Another caller filled the cache first.
    pub from_cache: bool,
}

/// Single-flight table of backend fetches, shared by every scope.
pub type FetchFlights = SingleFlight<Signature, Result<Fetched, FetchError>>;

/// Resolves directives for one scope.
#[derive(Clone)]
pub struct ResourceResolver {
    scope: Arc<ScopeConfig>,
    backends: Arc<BackendRegistry>,
    cache: CacheLayer,
    flights: Arc<FetchFlights>,
}

impl ResourceResolver {
    /// Create a resolver.
    pub fn new(
        scope: Arc<ScopeConfig>,
        backends: Arc<BackendRegistry>,
        cache: CacheLayer,
        flights: Arc<FetchFlights>,
    ) -> Self {
        Self {
            scope,
            backends,
            cache,
            flights,
        }
    }

    /// The scope this resolver serves.
    pub fn scope(&self) -> &ScopeConfig {
        &self.scope
    }

    /// The backends this resolver fetches from.
    pub fn backends(&self) -> &Arc<BackendRegistry> {
        &self.backends
    }

    /// Resolve a directive. Never fails: every error ends in fallback content.
    pub async fn resolve(&self, directive: &Directive, request_headers: &HeaderMap) -> Resolution {
        if !directive.has_resource() {
            return self.fallback(directive).await;
        }

        let scope = self.scope.scope.as_str();
        let forwarded = select_forward(
            request_headers,
            directive.forward_headers.or(&self.scope.forward_headers),
        );
        let signature = Signature::compute(scope, directive, &forwarded);

        if let Some(entry) = self.cache.get(scope, &signature).await {
            tracing::debug!(scope = %scope, signature = %signature, "cache hit");
            return Resolution {
                content: entry.fragment.content,
                headers: entry.fragment.headers,
                outcome: Outcome::Cached,
            };
        }

        let key = signature.clone();
        let result = self
            .flights
            .run(key, || self.fetch(directive, &signature, forwarded))
            .await;

        match result {
            Ok(fetched) => Resolution {
                content: fetched.fragment.content,
                headers: fetched.fragment.headers,
                outcome: if fetched.from_cache {
                    Outcome::Cached
                } else {
                    Outcome::Fetched {
                        alternative: fetched.alternative,
                    }
                },
            },
            Err(e) => {
                tracing::warn!(
                    scope = %scope,
                    signature = %signature,
                    tag = %directive.raw_str(),
                    error = %e,
                    "all alternatives failed"
                );
                self.fallback(directive).await
            }
        }
    }

    async fn fetch(
        &self,
        directive: &Directive,
        signature: &Signature,
        forwarded: HeaderMap,
    ) -> Result<Fetched, FetchError> {
        let scope = self.scope.scope.as_str();

        // A previous leader may have filled the cache while we waited to lead.
        if let Some(entry) = self.cache.get(scope, signature).await {
            return Ok(Fetched {
                fragment: entry.fragment,
                alternative: 0,
                from_cache: true,
            });
        }

        let timeout = self.scope.effective_timeout(directive.timeout);
        let mut last_error = FetchError::Unsupported("no alternatives".to_string());

        for (index, (backend, resource)) in self.attempts(directive).into_iter().enumerate() {
            match self.attempt(&backend, resource, forwarded.clone(), timeout).await {
                Ok(response) => {
                    let fragment = Fragment {
                        content: response.content,
                        headers: select_return(
                            &response.headers,
                            directive.return_headers.or(&self.scope.return_headers),
                        ),
                    };
                    let ttl = self.scope.effective_ttl(directive.ttl);
                    self.cache.set(scope, signature, fragment.clone(), ttl).await;
                    return Ok(Fetched {
                        fragment,
                        alternative: index,
                        from_cache: false,
                    });
                }
                Err(e) => {
                    tracing::debug!(scope = %scope, alternative = index, error = %e, "attempt failed");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    /// Backend name and resource for each alternative, in order.
    fn attempts(&self, directive: &Directive) -> Vec<(String, ResourceRef)> {
        if let Some(key) = directive.key() {
            return vec![(
                self.scope.key_backend.clone(),
                ResourceRef::Key(key.to_string()),
            )];
        }
        directive
            .resources
            .iter()
            .map(|r| (r.scheme().unwrap_or_default(), ResourceRef::Url(r.url.clone())))
            .collect()
    }

    async fn attempt(
        &self,
        backend_name: &str,
        resource: ResourceRef,
        headers: HeaderMap,
        timeout: Duration,
    ) -> Result<FetchResponse, FetchError> {
        let backend = self
            .backends
            .lookup(backend_name)
            .ok_or_else(|| FetchError::UnknownBackend(backend_name.to_string()))?;

        let label = resource.to_string();
        let request = FetchRequest::new(resource, headers, timeout);
        let response = fetch_with_deadline(backend.as_ref(), request).await?;
        if !self.scope.status_allowed(response.status) {
            return Err(FetchError::Status {
                status: response.status,
                resource: label,
            });
        }
        Ok(response)
    }

    async fn fallback(&self, directive: &Directive) -> Resolution {
        let fallback = select_fallback(directive, &self.scope).await;
        let outcome = if fallback.is_empty() {
            Outcome::Empty
        } else {
            Outcome::Fallback
        };
        Resolution {
            content: fallback.content,
            headers: HeaderMap::new(),
            outcome,
        }
    }
}

impl std::fmt::Debug for ResourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceResolver")
            .field("scope", &self.scope.scope)
            .field("backends", &self.backends)
            .finish()
    }
}
