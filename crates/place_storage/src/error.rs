//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The placement log is corrupted at the given offset.
    #[error("placement log corrupted at offset {offset}: {message}")]
    Corrupted {
        /// Byte offset of the bad record.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// A placement cannot be encoded into a log record.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Another process holds the log directory lock.
    #[error("placement log locked: another process has exclusive access to {0:?}")]
    Locked(PathBuf),

    /// The user directory file could not be read or written as JSON.
    #[error("user directory format error: {0}")]
    Json(#[from] serde_json::Error),

    /// A user with this name already exists.
    #[error("user already exists: {0}")]
    DuplicateUser(String),
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            message: message.into(),
        }
    }
}
