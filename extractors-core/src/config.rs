//! User settings stored at `<home>/.extractors/config.yaml`.
//!
//! # API pattern
//!
//! - `load_at(home)` reads the file only; used in tests with `TempDir`.
//! - `load()` derives home from `dirs::home_dir()` and applies `EXTRACTORS_*`
//!   environment overrides on top.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, RegistryError};
use crate::registry::DEFAULT_REGISTRY_URL;

/// Default cap on a value returned across the isolated-runtime boundary.
pub const DEFAULT_MAX_RESULT_BYTES: u64 = 1024 * 1024 * 1024;

pub const CONFIG_FILE: &str = "config.yaml";

/// Tool-wide settings. Every field has a default; the file may be partial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the extractor registry API.
    pub registry_url: String,
    /// Interpreter used for the ambient runtime and for creating environments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python: Option<PathBuf>,
    /// Where isolated environments live. Defaults to `<home>/.extractors/envs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_root: Option<PathBuf>,
    /// Kill extractor subprocesses after this many seconds. No limit when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    pub max_result_bytes: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            python: None,
            env_root: None,
            timeout_secs: None,
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
        }
    }
}

impl Settings {
    /// Apply `EXTRACTORS_*` overrides from an arbitrary variable source.
    pub fn apply_overrides<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = var("EXTRACTORS_REGISTRY_URL") {
            self.registry_url = url;
        }
        if let Some(python) = var("EXTRACTORS_PYTHON") {
            self.python = Some(PathBuf::from(python));
        }
        if let Some(root) = var("EXTRACTORS_ENV_ROOT") {
            self.env_root = Some(PathBuf::from(root));
        }
        if let Some(secs) = var("EXTRACTORS_TIMEOUT_SECS") {
            match secs.trim().parse() {
                Ok(secs) => self.timeout_secs = Some(secs),
                Err(_) => tracing::warn!(value = %secs, "ignoring non-numeric EXTRACTORS_TIMEOUT_SECS"),
            }
        }
        self
    }

    /// Environment root, falling back to `<home>/.extractors/envs`.
    pub fn env_root_at(&self, home: &Path) -> PathBuf {
        self.env_root
            .clone()
            .unwrap_or_else(|| extractors_root(home).join("envs"))
    }
}

/// `<home>/.extractors/`
pub fn extractors_root(home: &Path) -> PathBuf {
    home.join(".extractors")
}

/// `<home>/.extractors/config.yaml` — pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    extractors_root(home).join(CONFIG_FILE)
}

/// Load settings from `<home>/.extractors/config.yaml`, or defaults if absent.
pub fn load_at(home: &Path) -> Result<Settings, RegistryError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| RegistryError::Parse { path, source: e })
}

/// `load_at` convenience wrapper, with environment overrides applied.
pub fn load() -> Result<Settings, RegistryError> {
    Ok(load_at(&home()?)?.apply_overrides(|name| std::env::var(name).ok()))
}

pub fn home() -> Result<PathBuf, RegistryError> {
    dirs::home_dir().ok_or(RegistryError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
