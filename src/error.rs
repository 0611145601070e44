//! Error types for forge-docstore operations.
//!
//! Expected absence (a lookup by id that finds nothing) is modelled with
//! `Option` and never surfaces here. This enum covers the hard failures:
//! storage I/O, snapshot corruption, and per-record validation.

use std::io;
use thiserror::Error;

/// Result type alias using [`DocStoreError`].
pub type Result<T> = std::result::Result<T, DocStoreError>;

/// Errors that can occur during forge-docstore operations.
#[derive(Error, Debug)]
pub enum DocStoreError {
    /// I/O error while reading or writing a snapshot.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during serialization or deserialization.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Checksum verification failed during snapshot loading.
    #[error("checksum mismatch: snapshot may be corrupted")]
    ChecksumMismatch,

    /// Snapshot file has an invalid or unrecognized format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// Snapshot parsed but describes an impossible state.
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// A record handed to the store failed validation.
    #[error("validation failed for document '{id}': {reason}")]
    Validation {
        /// Id of the offending record (may be empty).
        id: String,
        /// Why the record was rejected.
        reason: String,
    },
}

impl DocStoreError {
    /// Creates a new `Serialization` error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Creates a new `InvalidFormat` error.
    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::InvalidFormat(msg.into())
    }

    /// Creates a new `CorruptSnapshot` error.
    pub fn corrupt_snapshot(msg: impl Into<String>) -> Self {
        Self::CorruptSnapshot(msg.into())
    }

    /// Creates a new `Validation` error.
    pub fn validation(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// True when the error means a snapshot exists but cannot be trusted.
    ///
    /// Callers use this to tell "rebuild from another source" apart from
    /// storage failures that must be surfaced.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Serialization(_)
                | Self::ChecksumMismatch
                | Self::InvalidFormat(_)
                | Self::CorruptSnapshot(_)
        )
    }
}

impl From<bincode::Error> for DocStoreError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DocStoreError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Self::Io(err.into())
        } else {
            Self::Serialization(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DocStoreError::validation("doc-1", "empty id");
        assert_eq!(
            err.to_string(),
            "validation failed for document 'doc-1': empty id"
        );

        let err = DocStoreError::ChecksumMismatch;
        assert_eq!(err.to_string(), "checksum mismatch: snapshot may be corrupted");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: DocStoreError = io_err.into();
        assert!(matches!(err, DocStoreError::Io(_)));
        assert!(!err.is_corruption());
    }

    #[test]
    fn test_corruption_classification() {
        assert!(DocStoreError::ChecksumMismatch.is_corruption());
        assert!(DocStoreError::invalid_format("bad magic").is_corruption());
        assert!(DocStoreError::corrupt_snapshot("dangling id").is_corruption());
        assert!(DocStoreError::serialization("eof").is_corruption());
        assert!(!DocStoreError::validation("x", "y").is_corruption());
    }

    #[test]
    fn test_error_from_json() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("{not json");
        let err: DocStoreError = parse.unwrap_err().into();
        assert!(err.is_corruption());
    }
}
