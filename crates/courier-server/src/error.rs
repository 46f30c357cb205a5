//! Socket host error types.
//!
//! These never reach a caller as a response; request-level failures are
//! taxonomy errors produced by the [`Manager`](crate::Manager).

use std::io;
use thiserror::Error;

/// Result type for socket host operations.
pub type ServeResult<T> = Result<T, ServeError>;

/// Errors raised while binding or serving the socket.
#[derive(Debug, Error)]
pub enum ServeError {
    /// IO error (socket, file, etc.).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Framing error on a connection.
    #[error("Protocol error: {0}")]
    Protocol(#[from] courier_protocol::ProtocolError),

    /// Another server is listening on the socket path.
    #[error("Socket path already in use: {path}")]
    SocketInUse { path: String },

    /// Socket path parent directory does not exist.
    #[error("Socket path parent directory does not exist: {path}")]
    SocketPathInvalid { path: String },

    /// The connection limiter was closed.
    #[error("Server is shutting down")]
    Shutdown,
}

impl ServeError {
    pub fn socket_in_use(path: impl Into<String>) -> Self {
        Self::SocketInUse { path: path.into() }
    }

    pub fn socket_path_invalid(path: impl Into<String>) -> Self {
        Self::SocketPathInvalid { path: path.into() }
    }

    /// Whether this error only means the peer went away or stalled.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::UnexpectedEof
            ),
            Self::Protocol(courier_protocol::ProtocolError::Timeout { .. }) => true,
            _ => false,
        }
    }
}
