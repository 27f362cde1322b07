//! Fallback content for directives that could not be fetched.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use esi_core::{Directive, OnError, ScopeConfig};

/// Where fallback content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackSource {
    /// The directive's `onerror` attribute.
    Directive,
    /// The scope's `on_error` setting.
    Scope,
    /// Nothing configured.
    None,
}

/// Selected fallback content.
#[derive(Debug, Clone)]
pub struct Fallback {
    pub content: Bytes,
    pub source: FallbackSource,
}

impl Fallback {
    /// Whether there is nothing to insert.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Pick the first non-empty of: the directive's `onerror` content, the
/// scope's `on_error` content, nothing.
///
/// A directive naming a file that cannot be read is logged and skipped.
pub async fn select_fallback(directive: &Directive, scope: &ScopeConfig) -> Fallback {
    if let Some(content) = directive_fallback(directive, scope).await {
        return Fallback {
            content,
            source: FallbackSource::Directive,
        };
    }

    if !scope.on_error_content.is_empty() {
        return Fallback {
            content: scope.on_error_content.clone(),
            source: FallbackSource::Scope,
        };
    }

    Fallback {
        content: Bytes::new(),
        source: FallbackSource::None,
    }
}

async fn directive_fallback(directive: &Directive, scope: &ScopeConfig) -> Option<Bytes> {
    let on_error = OnError::parse(&directive.on_error);
    let content = match &on_error {
        OnError::Literal(text) => Bytes::from(text.clone()),
        OnError::File(reference) => {
            let Some(path) = confined_file(&on_error, &scope.base_dir).await else {
                tracing::warn!(
                    scope = %scope.scope,
                    path = %reference.display(),
                    "onerror file outside the config directory"
                );
                return None;
            };
            match tokio::fs::read(&path).await {
                Ok(content) => Bytes::from(content),
                Err(e) => {
                    tracing::warn!(
                        scope = %scope.scope,
                        path = %path.display(),
                        error = %e,
                        "onerror file unreadable"
                    );
                    return None;
                }
            }
        }
    };
    (!content.is_empty()).then_some(content)
}

/// The canonical path of an `onerror` file, if it resolves inside `base_dir`.
async fn confined_file(on_error: &OnError, base_dir: &Path) -> Option<PathBuf> {
    let path = on_error.contained_path(base_dir)?;
    let base = tokio::fs::canonicalize(base_dir).await.ok()?;
    let path = tokio::fs::canonicalize(&path).await.ok()?;
    path.starts_with(&base).then_some(path)
}
