//! Error types for extractors-runtime.
//!
//! Every variant raised after the registry entry is known carries the entry
//! id, so a failure always names the extractor and the stage involved.

use std::path::PathBuf;

use thiserror::Error;

use extractors_core::RegistryError;
use extractors_usage::UsageError;

/// All errors that can arise from planning, provisioning and execution.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("input file {path} does not exist")]
    InputMissing { path: PathBuf },

    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("file type '{input_type}' is not supported by extractor '{entry_id}'")]
    UnsupportedInputType { entry_id: String, input_type: String },

    #[error("extractor '{entry_id}' declares no usage recipe with a supported method")]
    NoUsage { entry_id: String },

    #[error("extractor '{entry_id}': {source}")]
    Usage {
        entry_id: String,
        #[source]
        source: UsageError,
    },

    #[error("extractor '{entry_id}': installation method '{method}' is not supported")]
    UnsupportedInstallMethod { entry_id: String, method: String },

    #[error("installation of extractor '{entry_id}' failed after {} attempt(s): {}", attempts.len(), attempts.join("; "))]
    InstallationFailed {
        entry_id: String,
        attempts: Vec<String>,
    },

    #[error("cannot prepare runtime for extractor '{entry_id}': {reason}")]
    Environment { entry_id: String, reason: String },

    #[error("extractor '{entry_id}': cannot import module '{module}': {reason}")]
    ModuleNotFound {
        entry_id: String,
        module: String,
        reason: String,
    },

    #[error("extractor '{entry_id}': symbol '{symbol}' does not belong to module '{module}'")]
    SymbolMismatch {
        entry_id: String,
        module: String,
        symbol: String,
    },

    #[error("extractor '{entry_id}': cannot resolve '{symbol}' in module '{module}'")]
    SymbolResolution {
        entry_id: String,
        module: String,
        symbol: String,
    },

    #[error("extractor '{entry_id}': call to '{symbol}' failed: {reason}")]
    CallFailed {
        entry_id: String,
        symbol: String,
        reason: String,
    },

    #[error("extractor '{entry_id}': failed to launch '{program}': {source}")]
    Spawn {
        entry_id: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("extractor '{entry_id}': `{command}` exited with code {code}: {stderr}")]
    ProcessFailed {
        entry_id: String,
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("extractor '{entry_id}': requested output file {path} does not exist")]
    OutputMissing { entry_id: String, path: PathBuf },

    #[error("extractor '{entry_id}': result of {size} bytes exceeds the {limit}-byte transport limit")]
    ResultTooLarge {
        entry_id: String,
        size: u64,
        limit: u64,
    },

    #[error("extractor '{entry_id}': timed out after {timeout_secs}s")]
    Timeout { entry_id: String, timeout_secs: u64 },

    #[error("extractor '{entry_id}': worker protocol error: {reason}")]
    Bridge { entry_id: String, reason: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    /// The pipeline stage that failed, for user-facing summaries.
    pub fn stage(&self) -> &'static str {
        match self {
            ExtractError::Registry(_) => "lookup",
            ExtractError::InputMissing { .. } | ExtractError::Download { .. } => "input",
            ExtractError::UnsupportedInputType { .. }
            | ExtractError::NoUsage { .. }
            | ExtractError::Usage { .. } => "plan",
            ExtractError::UnsupportedInstallMethod { .. }
            | ExtractError::InstallationFailed { .. }
            | ExtractError::Environment { .. } => "provision",
            ExtractError::Io { .. } => "io",
            _ => "execute",
        }
    }

    /// The registry entry involved, when the failure happened past lookup.
    pub fn entry_id(&self) -> Option<&str> {
        match self {
            ExtractError::UnsupportedInputType { entry_id, .. }
            | ExtractError::NoUsage { entry_id }
            | ExtractError::Usage { entry_id, .. }
            | ExtractError::UnsupportedInstallMethod { entry_id, .. }
            | ExtractError::InstallationFailed { entry_id, .. }
            | ExtractError::Environment { entry_id, .. }
            | ExtractError::ModuleNotFound { entry_id, .. }
            | ExtractError::SymbolMismatch { entry_id, .. }
            | ExtractError::SymbolResolution { entry_id, .. }
            | ExtractError::CallFailed { entry_id, .. }
            | ExtractError::Spawn { entry_id, .. }
            | ExtractError::ProcessFailed { entry_id, .. }
            | ExtractError::OutputMissing { entry_id, .. }
            | ExtractError::ResultTooLarge { entry_id, .. }
            | ExtractError::Timeout { entry_id, .. }
            | ExtractError::Bridge { entry_id, .. } => Some(entry_id),
            ExtractError::Registry(_)
            | ExtractError::InputMissing { .. }
            | ExtractError::Download { .. }
            | ExtractError::Io { .. } => None,
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ExtractError {
    ExtractError::Io {
        path: path.into(),
        source,
    }
}
