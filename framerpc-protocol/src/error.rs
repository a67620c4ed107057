//! Protocol and codec error types.

use thiserror::Error;

/// Boxed error produced by a payload codec implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Framing errors. Any of these leaves the byte stream in an unknown
/// position, so the affected connection cannot be reused.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The peer closed the stream before sending the first header byte.
    #[error("connection closed")]
    ConnectionClosed,

    #[error("read header failed: {0}")]
    HeaderRead(#[source] std::io::Error),

    #[error("invalid magic number: {0:#010x}")]
    InvalidMagic(u32),

    #[error("read payload failed: {0}")]
    PayloadRead(#[source] std::io::Error),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u64, max: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns whether this error is an orderly end of stream rather than a
    /// transport or framing failure.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ProtocolError::ConnectionClosed)
    }
}

/// Payload codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(#[source] BoxError),

    #[error("decode failed: {0}")]
    Decode(#[source] BoxError),

    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),
}

impl CodecError {
    pub fn encode(err: impl Into<BoxError>) -> Self {
        CodecError::Encode(err.into())
    }

    pub fn decode(err: impl Into<BoxError>) -> Self {
        CodecError::Decode(err.into())
    }
}
