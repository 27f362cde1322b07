//! Per-scope log sinks.
//!
//! Each scope logs through its own `tracing::Dispatch`. Without both a file and a
//! level the dispatch is a blackhole.

use std::fmt;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use esi_core::{ConfigError, ScopeConfig};
use tracing::{Dispatch, Level};
use tracing_subscriber::fmt::MakeWriter;

/// Log level for a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The matching `tracing` level.
    pub fn as_level(self) -> Level {
        match self {
            Self::Trace => Level::TRACE,
            Self::Debug => Level::DEBUG,
            Self::Info => Level::INFO,
            Self::Warn => Level::WARN,
            Self::Error => Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ConfigError::InvalidLogLevel(s.to_string())),
        }
    }
}

/// Where a scope's log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    Blackhole,
    Stdout,
    Stderr,
    /// A file opened for append.
    File(PathBuf),
}

impl LogSink {
    /// Interpret a `log_file` setting. Empty means blackhole.
    pub fn parse(log_file: &str) -> Self {
        match log_file.trim() {
            "" => Self::Blackhole,
            "stdout" => Self::Stdout,
            "stderr" => Self::Stderr,
            path => Self::File(PathBuf::from(path)),
        }
    }
}

impl fmt::Display for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blackhole => write!(f, "blackhole"),
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A scope's log destination together with the dispatch writing to it.
#[derive(Clone)]
pub struct ScopeLogger {
    sink: LogSink,
    level: Option<LogLevel>,
    dispatch: Dispatch,
}

impl ScopeLogger {
    /// A logger that drops everything.
    pub fn blackhole() -> Self {
        Self {
            sink: LogSink::Blackhole,
            level: None,
            dispatch: Dispatch::none(),
        }
    }

    /// Build from `log_file` and `log_level`.
    ///
    /// An empty file or level gives a blackhole. An unknown level or a file that
    /// cannot be opened is a configuration error.
    pub fn new(log_file: &str, log_level: &str) -> Result<Self, ConfigError> {
        let sink = LogSink::parse(log_file);
        if log_level.trim().is_empty() || sink == LogSink::Blackhole {
            return Ok(Self::blackhole());
        }
        let level: LogLevel = log_level.parse()?;

        let dispatch = match &sink {
            LogSink::Blackhole => Dispatch::none(),
            LogSink::Stdout => dispatch_to(level, std::io::stdout),
            LogSink::Stderr => dispatch_to(level, std::io::stderr),
            LogSink::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| ConfigError::LogFile {
                        path: path.clone(),
                        source,
                    })?;
                dispatch_to(level, Mutex::new(file))
            }
        };

        Ok(Self {
            sink,
            level: Some(level),
            dispatch,
        })
    }

    /// Build from a scope's settings.
    pub fn from_scope(scope: &ScopeConfig) -> Result<Self, ConfigError> {
        Self::new(&scope.log_file, &scope.log_level)
    }

    /// The dispatch to run scope work under.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Where lines go.
    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    /// Configured level, `None` for a blackhole.
    pub fn level(&self) -> Option<LogLevel> {
        self.level
    }

    /// Whether everything is dropped.
    pub fn is_blackhole(&self) -> bool {
        self.level.is_none()
    }
}

impl fmt::Debug for ScopeLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeLogger")
            .field("sink", &self.sink)
            .field("level", &self.level)
            .finish()
    }
}

fn dispatch_to<W>(level: LogLevel, writer: W) -> Dispatch
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(level.as_level())
        .with_writer(writer)
        .finish();
    Dispatch::new(subscriber)
}
