//! Error types for extractors-usage.

use thiserror::Error;

/// All errors that can arise from reading a usage recipe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    /// The command is not a `symbol.path(args...)` expression.
    #[error("cannot parse call expression '{command}': {reason}")]
    Parse { command: String, reason: String },

    /// One argument segment is ambiguous or malformed.
    #[error("cannot parse argument '{segment}' in '{command}': {reason}")]
    Argument {
        command: String,
        segment: String,
        reason: String,
    },

    /// `setup` is something other than a bare module path.
    #[error("unsupported setup '{setup}': only a bare module import is supported")]
    Setup { setup: String },
}
