//! Error types for helpsync.
//!
//! Library crates use [`HelpsyncError`] via `thiserror`.
//! App crates (cli/server) wrap this with `color-eyre` for rich diagnostics.
//!
//! The variants mirror the pipeline's failure policy: `Listing` is fatal for
//! a run, while `Fetch`, `Io` and `Upload` are per-item failures that feed
//! the run's failure tracker. `Aborted` is the soft threshold-trip signal
//! and is reported as a run status, never raised to a trigger surface.

use std::path::PathBuf;

/// Top-level error type for all helpsync operations.
#[derive(Debug, thiserror::Error)]
pub enum HelpsyncError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Article listing failed (sitemap or API unreachable/malformed).
    /// Fatal for the whole run.
    #[error("listing error: {0}")]
    Listing(String),

    /// Single-article content retrieval failed. Recorded as a failure,
    /// iteration continues.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Destination API rejected or was unreachable for one document.
    #[error("upload error: {0}")]
    Upload(String),

    /// XML/HTML parsing or content extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error (staging write, staged-file read/delete).
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (missing credentials, bad URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The run tripped its consecutive-failure threshold while an operation
    /// was in flight. The operation's output is discarded.
    #[error("run aborted: too many consecutive failures")]
    Aborted,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HelpsyncError>;

impl HelpsyncError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is fatal for the whole run (as opposed to a
    /// per-item failure that only bumps the failure counter).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Listing(_) | Self::Config { .. })
    }
}
