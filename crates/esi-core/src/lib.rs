//! Core types for ESI edge assembly.
//!
//! This crate provides:
//! - `Directive` - A parsed `<esi:include>` tag
//! - `HeaderSelection` - Forwarded/returned header filtering
//! - `ScopeConfig` / `EsiConfig` - Per-scope settings
//! - `PageIdSource` - What identifies a page
//! - `ErrorKind` - The closed error taxonomy

mod config;
mod directive;
pub mod duration;
mod error;
mod headers;
mod on_error;
mod page_id;

pub use config::*;
pub use directive::*;
pub use duration::{format_duration, parse_duration, DurationError};
pub use error::*;
pub use headers::*;
pub use on_error::*;
pub use page_id::{page_id, PageIdSource};
