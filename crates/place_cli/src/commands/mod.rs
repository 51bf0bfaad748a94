//! CLI command implementations.

pub mod inspect;
pub mod serve;
pub mod token;
pub mod user;
pub mod verify;

use place_server::ServerError;
use place_storage::StorageError;
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Server setup or runtime failure.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// Placement log or user directory failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// I/O failure outside of storage.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON output failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The command cannot run with the given input.
    #[error("{0}")]
    Usage(String),

    /// `verify` found damage.
    #[error("verification failed")]
    VerificationFailed,
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;
