//! Error types for PulseDB
//!
//! A single `PulseError` taxonomy is used across all crates so kinds are
//! preserved across component boundaries. We use `thiserror` for the
//! `Display`/`Error` implementations.
//!
//! Policy: validation and resource-limit errors are reported and never
//! retried; lock timeouts and transaction aborts are retryable by the
//! caller; corruption and version mismatches are fatal. A runtime
//! invariant violation surfaces as `Corrupt` and flips the database into
//! read-only safe mode until reopened.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for PulseDB operations
pub type Result<T> = std::result::Result<T, PulseError>;

/// Error taxonomy for the PulseDB engine
#[derive(Debug, Error)]
pub enum PulseError {
    /// Input failed validation (empty content, range violation, too many tags, ...)
    #[error("validation failed: {0}")]
    Validation(String),

    /// An entity required by the operation does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind ("collective", "experience", ...)
        entity: &'static str,
        /// The missing id, rendered
        id: String,
    },

    /// Embedding length does not match the collective's frozen dimension
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The collective's frozen dimension
        expected: usize,
        /// The offending vector's length
        actual: usize,
    },

    /// On-disk state is damaged; fatal, no auto-repair
    #[error("database corrupt: {0}")]
    Corrupt(String),

    /// The vector index sidecar is damaged and must be rebuilt
    #[error("vector index corrupt: {0}")]
    IndexCorrupt(String),

    /// I/O failure; aborts the current transaction cleanly
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Row or WAL entry (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The current transaction was aborted; retryable with backoff
    #[error("transaction aborted: {0}")]
    TxnAborted(String),

    /// Could not acquire the in-process writer lock in time; retryable
    #[error("writer lock timeout after {0:?}")]
    LockTimeout(Duration),

    /// Could not acquire the cross-process file lock; fatal for the open attempt
    #[error("file lock timeout: {}", .0.display())]
    FileLockTimeout(PathBuf),

    /// A read scan hit its deadline; the snapshot was released
    #[error("query timeout")]
    QueryTimeout,

    /// Embedding model load or inference failure; surfaced, never silently replaced
    #[error("embedding error: {0}")]
    Embedding(String),

    /// A configured quota was exceeded; reported, not retried
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),

    /// Stored schema version is newer than this build understands
    #[error("schema version mismatch: stored {stored}, supported up to {supported}")]
    VersionMismatch {
        /// Version found in the metadata table
        stored: u32,
        /// Highest version this build supports
        supported: u32,
    },

    /// The database is in read-only safe mode after detected corruption
    #[error("database is read-only after a detected invariant violation; reopen to recover")]
    ReadOnly,
}

impl From<bincode::Error> for PulseError {
    fn from(e: bincode::Error) -> Self {
        PulseError::Serialization(e.to_string())
    }
}

impl PulseError {
    /// True for transient errors the caller may retry with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, PulseError::TxnAborted(_) | PulseError::LockTimeout(_))
    }

    /// True for errors that leave the database unusable until reopened
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PulseError::Corrupt(_)
                | PulseError::VersionMismatch { .. }
                | PulseError::FileLockTimeout(_)
        )
    }

    /// Convenience constructor for missing entities
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        PulseError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
