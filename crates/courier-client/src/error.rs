//! Client error types.
//!
//! Calls themselves fail with [`RpcError`]. The types here describe what
//! goes wrong underneath: moving bytes ([`TransportError`]), loading
//! settings ([`ConfigError`]) and running a CLI command ([`CommandError`]).

use std::fmt;
use std::io;
use std::path::PathBuf;

use courier_protocol::{ErrorKind, ProtocolError, RpcError};

/// Result type for transports.
pub type TransportResult<T> = Result<T, TransportError>;

/// Failure to deliver a request or collect its response.
#[derive(Debug)]
pub enum TransportError {
    /// A taxonomy error raised by the transport itself. Passed through.
    Rpc(RpcError),
    /// Connecting to the peer failed.
    Connection(String),
    /// IO error on an established connection.
    Io(io::Error),
    /// Framing error.
    Protocol(ProtocolError),
    /// The peer did not answer in time.
    Timeout(String),
    /// Anything else, named by kind.
    Other { kind: String, description: String },
}

impl TransportError {
    pub fn other(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Other {
            kind: kind.into(),
            description: description.into(),
        }
    }

    /// The taxonomy error a caller sees for this failure.
    ///
    /// Timeouts become `Timeout`; every other non-taxonomy failure becomes
    /// a `ServerError` carrying `"<kind>: <description>"`.
    pub fn into_rpc(self) -> RpcError {
        match self {
            Self::Rpc(err) => err,
            Self::Timeout(operation) => RpcError::timeout(operation),
            Self::Io(err) if is_timeout(&err) => RpcError::timeout(err.to_string()),
            Self::Io(err) => RpcError::from_failure(ErrorKind::ServerError, "IoError", err),
            Self::Protocol(ProtocolError::Timeout { operation }) => RpcError::timeout(operation),
            Self::Protocol(ProtocolError::Io(err)) if is_timeout(&err) => {
                RpcError::timeout(err.to_string())
            }
            Self::Protocol(err) => {
                RpcError::from_failure(ErrorKind::ServerError, "ProtocolError", err)
            }
            Self::Connection(msg) => {
                RpcError::from_failure(ErrorKind::ServerError, "ConnectionError", msg)
            }
            Self::Other { kind, description } => {
                RpcError::from_failure(ErrorKind::ServerError, &kind, description)
            }
        }
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rpc(err) => write!(f, "{err}"),
            Self::Connection(msg) => write!(f, "connection error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
            Self::Protocol(err) => write!(f, "protocol error: {err}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Other { kind, description } => write!(f, "{kind}: {description}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rpc(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Protocol(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RpcError> for TransportError {
    fn from(err: RpcError) -> Self {
        Self::Rpc(err)
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ProtocolError> for TransportError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

/// Failure to load the client configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Failure of a `courier` CLI command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The remote call failed.
    #[error("call failed: {0}")]
    Call(#[from] RpcError),

    #[error("failed to render output: {0}")]
    Output(String),
}

/// Result type for CLI commands.
pub type CommandResult<T> = Result<T, CommandError>;
