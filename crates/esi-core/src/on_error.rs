//! Fallback content referenced by `onerror` / `on_error`.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;

use crate::error::ConfigError;

/// Where fallback content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnError {
    /// Inline text.
    Literal(String),
    /// Contents of a file, relative to the configuration directory.
    File(PathBuf),
}

impl OnError {
    /// Classify a reference. A single word with a file extension such as
    /// `nocart.html` names a file; anything else is literal text.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        let looks_like_file = !value.is_empty()
            && !value.contains(char::is_whitespace)
            && Path::new(value)
                .extension()
                .is_some_and(|ext| !ext.is_empty());

        if looks_like_file {
            Self::File(PathBuf::from(value))
        } else {
            Self::Literal(value.to_string())
        }
    }

    /// The referenced file joined onto `base_dir`, unless the reference is
    /// absolute or climbs out with `..`.
    pub fn contained_path(&self, base_dir: &Path) -> Option<PathBuf> {
        match self {
            Self::File(path) if is_contained(path) => Some(base_dir.join(path)),
            _ => None,
        }
    }

    /// Load the content synchronously. Used at configuration time.
    pub fn load(&self, base_dir: &Path) -> Result<Bytes, ConfigError> {
        match self {
            Self::Literal(text) => Ok(Bytes::from(text.clone())),
            Self::File(path) => {
                let path = base_dir.join(path);
                std::fs::read(&path)
                    .map(Bytes::from)
                    .map_err(|source| ConfigError::OnErrorFile { path, source })
            }
        }
    }
}

/// A relative path made only of plain components.
pub fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
