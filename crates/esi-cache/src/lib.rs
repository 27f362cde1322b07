//! Fragment caching for ESI edge assembly.
//!
//! This crate provides:
//! - `Signature` - Deterministic cache key of a directive resolution
//! - `CacheStore` trait - A TTL store of fragments, with `MemoryCache`
//! - `ScopeCacheRegistry` - Stores per scope
//! - `CacheLayer` - Lookup and fill across a scope's stores
//! - `SingleFlight` - At most one fetch per key in flight
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use esi_cache::{CacheLayer, Fragment, MemoryCache, ScopeCacheRegistry};
//!
//! let registry = Arc::new(ScopeCacheRegistry::new());
//! registry.register("/catalog", Arc::new(MemoryCache::new()));
//!
//! let cache = CacheLayer::new(registry);
//! cache.set("/catalog", &signature, Fragment::new("<p>cart</p>"), Duration::from_secs(30)).await;
//! ```

mod entry;
mod flight;
mod layer;
mod registry;
mod signature;
mod store;

pub use entry::*;
pub use flight::*;
pub use layer::*;
pub use registry::*;
pub use signature::*;
pub use store::*;
