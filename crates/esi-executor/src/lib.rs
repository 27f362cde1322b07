//! Directive resolution and page assembly.
//!
//! This crate provides:
//! - `ResourceResolver` - Cache check, ordered failover, deadlines and fallback for one directive
//! - `PageAssembler` - Finds includes in a page and splices in their content
//! - `EsiMiddleware` - Scope selection, method filtering and per-scope wiring

mod assembler;
mod fallback;
mod middleware;
mod resolver;
mod scan;

pub use assembler::*;
pub use fallback::*;
pub use middleware::*;
pub use resolver::*;
pub use scan::*;
