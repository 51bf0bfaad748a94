//! Error types for the canvas server.

use place_protocol::{ParseError, Reply};
use place_storage::StorageError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the canvas server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Malformed, unknown or out-of-range command.
    #[error("invalid command: {0}")]
    Protocol(String),

    /// The connection is not allowed to do this right now.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// `AUTH` on a connection that is already authenticated.
    #[error("connection is already authenticated")]
    AlreadyAuthenticated,

    /// The token did not resolve to a user.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The target of a command does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Placement log or user directory failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A blocking job could not be run or did not finish.
    #[error("worker pool error: {0}")]
    Worker(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// WebSocket transport error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ParseError> for ServerError {
    fn from(err: ParseError) -> Self {
        ServerError::Protocol(err.to_string())
    }
}

impl ServerError {
    /// Returns true if this is the client's fault and is answered with a reply.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::Protocol(_)
                | ServerError::Forbidden(_)
                | ServerError::AlreadyAuthenticated
                | ServerError::AuthenticationFailed(_)
                | ServerError::NotFound(_)
        )
    }

    /// Returns true if this is an infrastructure failure.
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Returns true if this error only means the peer went away.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            ServerError::WebSocket(
                tungstenite::Error::ConnectionClosed
                    | tungstenite::Error::AlreadyClosed
                    | tungstenite::Error::Protocol(
                        tungstenite::error::ProtocolError::ResetWithoutClosingHandshake
                    )
            )
        )
    }

    /// The line sent back to the issuing connection.
    pub fn reply(&self) -> Reply {
        match self {
            ServerError::Protocol(_) | ServerError::NotFound(_) => Reply::Invalid,
            ServerError::Forbidden(_) => Reply::Forbidden,
            ServerError::AlreadyAuthenticated => Reply::AlreadyAuthenticated,
            ServerError::AuthenticationFailed(_) => Reply::AuthenticationFailed,
            ServerError::Storage(_)
            | ServerError::Worker(_)
            | ServerError::Config(_)
            | ServerError::WebSocket(_)
            | ServerError::Io(_) => Reply::Error,
        }
    }
}
