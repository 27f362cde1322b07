//! Fetch backends for ESI includes.
//!
//! This crate provides:
//! - `Backend` trait - One fetch attempt for a URL or key
//! - `BackendRegistry` - Backends by name
//! - `HttpBackend` - HTTP services via `reqwest`
//! - `MemoryStore` - In-process key-value store
//! - `fetch_with_deadline` - Deadline enforcement for one attempt

mod backend;
mod deadline;
mod error;
mod http_backend;
mod memory;
mod registry;

pub use backend::*;
pub use deadline::*;
pub use error::*;
pub use http_backend::*;
pub use memory::*;
pub use registry::*;
