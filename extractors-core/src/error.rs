//! Error types for extractors-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from registry lookups, entry files and settings.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying I/O failure while reading an entry or settings file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An HTTP status error or transport failure against the registry.
    #[error("registry lookup failed at {url}: {reason}")]
    Lookup { url: String, reason: String },

    /// The registry answered, but the body was not the expected document.
    #[error("unexpected registry response from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// The registry knows the file type but lists no extractor for it.
    #[error("no extractors registered for file type '{input_type}'")]
    NoExtractorFound { input_type: String },

    /// YAML/JSON parse error on load, with file path and line context.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The entry document parsed but violates a structural invariant.
    #[error("invalid registry entry '{id}': {reason}")]
    InvalidEntry { id: String, reason: String },

    /// `dirs::home_dir()` returned `None`, so we cannot locate `~/.extractors/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.into(),
        source,
    }
}
