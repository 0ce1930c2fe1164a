//! Centralized error types for unsubly.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// All errors produced by the unsubly library.
#[derive(Error, Debug)]
pub enum UnsublyError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The provider asked us to slow down. Retryable after a backoff.
    #[error("Rate limited by mail provider")]
    RateLimited {
        /// Delay suggested by the provider (`Retry-After`), if any.
        retry_after: Option<Duration>,
    },

    /// The requested message or label does not exist (anymore).
    #[error("Not found: {0}")]
    NotFound(String),

    /// A network hiccup or server-side error. The request is skipped.
    #[error("Transient provider error: {0}")]
    Transient(String),

    /// Credentials are missing, expired, or rejected.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// An unexpected provider response. Skips the request like `Transient`.
    #[error("Mail provider error: {0}")]
    Provider(String),

    /// A persisted artifact could not be parsed.
    #[error("Invalid data in '{path}' at line {line}: {reason}")]
    InvalidArtifact {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, UnsublyError>`.
pub type Result<T> = std::result::Result<T, UnsublyError>;

impl UnsublyError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a backoff-and-retry can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Server-requested wait before retrying, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Whether the error must stop the whole scan instead of a single message.
    ///
    /// Only bad credentials qualify: every later request would fail the same way.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `UnsublyError::io`).
impl From<std::io::Error> for UnsublyError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(UnsublyError::RateLimited { retry_after: None }.is_retryable());
        assert!(!UnsublyError::Transient("boom".into()).is_retryable());
        assert_eq!(
            UnsublyError::RateLimited {
                retry_after: Some(Duration::from_secs(3))
            }
            .retry_after(),
            Some(Duration::from_secs(3))
        );
        assert!(UnsublyError::Authentication("expired".into()).is_fatal());
        assert!(!UnsublyError::Provider("400".into()).is_fatal());
        assert!(!UnsublyError::NotFound("abc".into()).is_fatal());
    }

    #[test]
    fn test_io_helper_keeps_path() {
        let err = UnsublyError::io(
            "/tmp/x.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/tmp/x.txt"));
    }
}
