//! Public SDK for ESI edge assembly.
//!
//! This crate re-exports all platform functionality:
//!
//! ```ignore
//! use esi_sdk::prelude::*;
//!
//! let config = EsiConfig::load("esi.toml")?;
//! let esi = EsiMiddleware::from_config(&config)?;
//!
//! let store = Arc::new(MemoryStore::new());
//! store.insert("header", "<header>shop</header>");
//! esi.backends("/").unwrap().register("backend", store);
//!
//! let body = esi
//!     .process(&Method::GET, "/", &request_headers, upstream_body)
//!     .await
//!     .into_body();
//! ```

pub use esi_backend;
pub use esi_cache;
pub use esi_core;
pub use esi_executor;
pub use esi_observability;

/// Prelude for convenient imports.
pub mod prelude {
    pub use esi_backend::{
        backend_fn, Backend, BackendRegistry, FetchError, FetchRequest, FetchResponse,
        HttpBackend, MemoryStore, ResourceRef,
    };
    pub use esi_cache::{CacheStore, Fragment, MemoryCache, ScopeCacheRegistry, Signature};
    pub use esi_core::{
        ConfigError, Directive, EsiConfig, ErrorKind, HeaderSelection, ParseError, ScopeConfig,
    };
    pub use esi_executor::{Assembled, EsiMiddleware, PageAssembler, Processed, ScopeRuntime};
    pub use esi_observability::{FragmentOutcome, LogLevel, PageMetrics, ScopeLogger};
}
