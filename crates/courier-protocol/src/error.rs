//! Protocol error types.
//!
//! These are infrastructure failures (codec, framing, I/O). They never
//! travel over the wire themselves; the layer that hits one decides which
//! taxonomy error, if any, to report to the peer.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding, decoding or framing messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Message exceeds the maximum allowed size.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: u32, max: u32 },

    /// The codec could not turn a value into bytes.
    #[error("encode failed: {0}")]
    Encode(String),

    /// The codec could not turn bytes into a value.
    ///
    /// `kind` names the failure class (`SyntaxError`, `EofError`, ...).
    #[error("{kind}: {description}")]
    Decode { kind: String, description: String },

    /// IO error during read/write.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection closed before the full frame arrived.
    #[error("incomplete message: expected {expected} bytes, got {received}")]
    IncompleteMessage { expected: usize, received: usize },

    /// A frame announced a zero-length payload.
    #[error("empty message")]
    EmptyMessage,

    /// Operation timed out.
    #[error("timeout during {operation}")]
    Timeout { operation: String },
}

impl ProtocolError {
    /// Creates a decode error.
    pub fn decode(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Decode {
            kind: kind.into(),
            description: description.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }
}
