//! Error taxonomy shared by all ESI crates.

use std::path::PathBuf;

use crate::duration::DurationError;

/// Closed set of error categories.
///
/// Callers branch on the kind instead of probing error values:
/// only [`ErrorKind::Configuration`] is allowed to abort startup, every other
/// kind is recovered while a page is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A directive could not be parsed.
    Parse,
    /// A backend attempt failed, timed out or returned a disallowed status.
    Fetch,
    /// The deployed configuration is broken.
    Configuration,
    /// A cache store could not be reached.
    CacheBackend,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse => write!(f, "parse"),
            Self::Fetch => write!(f, "fetch"),
            Self::Configuration => write!(f, "configuration"),
            Self::CacheBackend => write!(f, "cache backend"),
        }
    }
}

/// Errors raised while parsing a single directive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The tag is not valid UTF-8.
    #[error("tag is not valid UTF-8")]
    InvalidUtf8,

    /// The tag does not start with a supported keyword.
    #[error("unsupported directive {0:?}, expected \"include\"")]
    UnsupportedDirective(String),

    /// An attribute name is not followed by `=`.
    #[error("attribute {0:?} is missing '='")]
    MissingEquals(String),

    /// An attribute value does not start with a double quote.
    #[error("value of attribute {0:?} must be double-quoted")]
    MissingQuote(String),

    /// An attribute value has no closing double quote.
    #[error("value of attribute {0:?} is not terminated")]
    UnterminatedValue(String),

    /// A `timeout` or `ttl` value is not a valid duration.
    #[error("invalid duration in {attribute}: {source} => {value:?}")]
    InvalidDuration {
        attribute: &'static str,
        value: String,
        #[source]
        source: DurationError,
    },
}

impl ParseError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Parse
    }
}

/// Errors raised while loading configuration or building registries from it.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be decoded.
    #[error("failed to parse config file {path}: {message}")]
    Format { path: PathBuf, message: String },

    /// A scope is malformed.
    #[error("invalid scope {scope:?}: {reason}")]
    InvalidScope { scope: String, reason: String },

    /// An `on_error` file could not be read.
    #[error("failed to read on_error file {path}: {source}")]
    OnErrorFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A backend URL has no scheme.
    #[error("invalid URL {url:?} for backend {name:?}")]
    InvalidBackendUrl { name: String, url: String },

    /// A backend URL uses a scheme with no implementation.
    #[error("unsupported scheme {scheme:?} for backend {name:?}")]
    UnsupportedBackend { name: String, scheme: String },

    /// A backend client could not be constructed.
    #[error("failed to build backend {name:?}: {message}")]
    BackendInit { name: String, message: String },

    /// A cache URL uses a scheme with no implementation.
    #[error("unsupported cache URL {0:?}")]
    UnsupportedCache(String),

    /// A log level is not recognized.
    #[error("invalid log level {0:?}")]
    InvalidLogLevel(String),

    /// A log file could not be opened.
    #[error("failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(ParseError::InvalidUtf8.kind(), ErrorKind::Parse);
        assert_eq!(
            ConfigError::UnsupportedCache("redis://x".to_string()).kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_invalid_duration_message() {
        let err = ParseError::InvalidDuration {
            attribute: "timeout",
            value: "9a".to_string(),
            source: DurationError::UnknownUnit {
                unit: "a".to_string(),
                input: "9a".to_string(),
            },
        };
        assert_eq!(
            err.to_string(),
            r#"invalid duration in timeout: time: unknown unit a in duration 9a => "9a""#
        );
    }
}
