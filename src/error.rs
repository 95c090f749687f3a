//! Error types for DiskImager
//!
//! Truncation and cancellation are not errors: the transfer engine reports
//! them through its boolean result. Everything here is a genuine failure
//! that propagates to the caller untouched, with no retries.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for DiskImager operations
#[derive(Error, Debug)]
pub enum ImagerError {
    /// I/O error while reading or writing an image or device
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Image or device not found
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// Source and destination are the same
    #[error("Source and destination are the same: {0}")]
    SameSourceAndDestination(PathBuf),

    /// Computed checksum differs from the expected one
    #[error("Integrity check failed for '{path}': expected {expected}, got {actual}")]
    IntegrityMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Destination cannot hold the requested number of bytes
    #[error("Destination '{path}' is too small: need {required} bytes, have {available} bytes")]
    DestinationTooSmall {
        path: PathBuf,
        required: u64,
        available: u64,
    },

    /// Source length could not be determined
    #[error("Cannot determine the size of '{0}'")]
    UnknownSize(PathBuf),

    /// The read-ahead producer thread failed or panicked
    #[error("Read-ahead producer failed: {0}")]
    ReadAheadFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Operation cancelled by user
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ImagerError>,
    },
}

impl ImagerError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an integrity mismatch error
    pub fn integrity_mismatch(
        path: impl Into<PathBuf>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::IntegrityMismatch {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Check if this error is a permission issue
    pub fn is_permission_error(&self) -> bool {
        match self {
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::PermissionDenied,
            Self::WithContext { source, .. } => source.is_permission_error(),
            _ => false,
        }
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. }
            | Self::NotFound(path)
            | Self::SameSourceAndDestination(path)
            | Self::IntegrityMismatch { path, .. }
            | Self::DestinationTooSmall { path, .. }
            | Self::UnknownSize(path) => Some(path),
            Self::WithContext { source, .. } => source.path(),
            _ => None,
        }
    }
}

/// Result type alias for DiskImager operations
pub type Result<T> = std::result::Result<T, ImagerError>;

impl From<std::io::Error> for ImagerError {
    fn from(err: std::io::Error) -> Self {
        ImagerError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for ImagerError {
    fn from(err: serde_json::Error) -> Self {
        ImagerError::ConfigError(err.to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| ImagerError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "device gone");
        let err = ImagerError::io("/dev/sdz", io_err);
        assert_eq!(err.path().unwrap(), &PathBuf::from("/dev/sdz"));
    }

    #[test]
    fn test_context_keeps_path_and_kind() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked");
        let err = ImagerError::io("/dev/sdb", io_err).with_context("opening destination");

        assert!(err.is_permission_error());
        assert_eq!(err.path().unwrap(), &PathBuf::from("/dev/sdb"));
        assert!(err.to_string().starts_with("opening destination: "));
    }

    #[test]
    fn test_with_path_extension() {
        let result: std::io::Result<()> =
            Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short"));
        let err = result.with_path("image.img").unwrap_err();
        assert!(matches!(err, ImagerError::Io { .. }));
        assert_eq!(err.path().unwrap(), &PathBuf::from("image.img"));
    }
}
