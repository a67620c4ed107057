//! Client error types.

use framerpc_protocol::{CodecError, ProtocolError};
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(ProtocolError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::ConnectionClosed => ClientError::ConnectionClosed,
            other => ClientError::Protocol(other),
        }
    }
}

impl ClientError {
    /// Returns whether the connection is unusable after this error.
    ///
    /// A timed out request may still be answered later, or may have left a
    /// partial frame on the stream, so timeouts count as connection errors.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_)
                | ClientError::Protocol(_)
                | ClientError::NotConnected
                | ClientError::ConnectionClosed
                | ClientError::Timeout
        )
    }
}
