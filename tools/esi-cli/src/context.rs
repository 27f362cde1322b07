//! CLI execution context.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use esi_core::EsiConfig;

use crate::output::Output;

const CONFIG_NAMES: [&str; 2] = ["esi.toml", "esi.json"];

/// Execution context for CLI commands.
pub struct Context {
    /// Config file, given or discovered.
    pub config_path: Option<PathBuf>,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
}

impl Context {
    /// Locate the config file. Without an explicit path, the working
    /// directory and its parents are searched.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let config_path = match config_path {
            Some(path) => Some(resolve_path(&cwd, path)),
            None => find_config(&cwd),
        };
        if let Some(path) = &config_path {
            tracing::debug!(config = %path.display(), "using config");
        }

        Ok(Self {
            config_path,
            output,
            cwd,
        })
    }

    /// Load and validate the configuration.
    pub fn config(&self) -> Result<(&Path, EsiConfig)> {
        let Some(path) = self.config_path.as_deref() else {
            bail!("no esi.toml found; pass --config");
        };
        let config = EsiConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?;
        Ok((path, config))
    }

    /// Resolve a path relative to the working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        resolve_path(&self.cwd, path)
    }
}

fn resolve_path(cwd: &Path, path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}

/// Find a config file in the directory tree.
fn find_config(start: &Path) -> Option<PathBuf> {
    start.ancestors().find_map(|dir| {
        CONFIG_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    })
}
