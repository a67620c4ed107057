//! # framerpc-protocol
//!
//! Wire protocol implementation for framerpc.
//!
//! This crate provides:
//! - Binary framing with a fixed 12-byte big-endian header
//! - The request envelope carrying a method name and opaque parameters
//! - The pluggable payload codec trait and its JSON implementation

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::{JsonCodec, PayloadCodec};
pub use error::{CodecError, ProtocolError};
pub use frame::{encode_frame, read_frame, read_frame_with_limit, write_frame, Frame};
pub use frame::{FRAME_HEADER_SIZE, MAGIC};
pub use message::Envelope;

/// Default port for a framerpc server.
pub const DEFAULT_PORT: u16 = 8080;
