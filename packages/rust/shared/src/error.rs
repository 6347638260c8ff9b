//! Error types for Newsreel.
//!
//! Library crates use [`NewsreelError`] via `thiserror` for infrastructure
//! failures (config, I/O, storage). Pipeline stages use [`StageError`], whose
//! [`ErrorKind`] drives the retry and containment policy in the stage runner.
//! The CLI wraps both with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for Newsreel infrastructure operations.
#[derive(Debug, thiserror::Error)]
pub enum NewsreelError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, NewsreelError>;

impl NewsreelError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
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
}

// ---------------------------------------------------------------------------
// Stage error taxonomy
// ---------------------------------------------------------------------------

/// Classification of a per-lead stage failure.
///
/// The kind decides what the stage runner does with the failure:
/// `Transient` and `Timeout` are retried with backoff, `Validation` fails the
/// lead immediately, and `Capability` short-circuits the rest of the batch
/// (retrying lead-by-lead against a dead collaborator wastes the budget).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Retryable: rate limit, network hiccup, 5xx from a collaborator.
    Transient,
    /// Malformed lead or collaborator response. Never retried.
    Validation,
    /// Collaborator permanently unavailable (bad credentials, dead endpoint).
    Capability,
    /// Per-lead deadline exceeded. Retried like Transient.
    Timeout,
}

impl ErrorKind {
    /// Whether a failure of this kind should be retried.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transient | Self::Timeout)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Transient => "transient",
            Self::Validation => "validation",
            Self::Capability => "capability",
            Self::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// A classified failure from one pipeline stage attempt on one lead.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct StageError {
    /// Failure classification driving retry/containment policy.
    pub kind: ErrorKind,
    /// Human-readable cause, surfaced in the run report.
    pub message: String,
}

impl StageError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
        }
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, msg)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, msg)
    }

    pub fn capability(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Capability, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, msg)
    }

    /// Whether the stage runner should retry this failure.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = NewsreelError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = StageError::transient("429 from provider");
        assert_eq!(err.to_string(), "transient error: 429 from provider");
    }

    #[test]
    fn retry_policy_by_kind() {
        assert!(ErrorKind::Transient.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::Capability.is_retryable());
    }
}
