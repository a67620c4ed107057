//! # framerpc-client
//!
//! Client library for framerpc.
//!
//! This crate provides:
//! - A framed TCP connection with its own sequence counter
//! - A typed `call` API encoding parameters and decoding replies with a payload codec

pub mod client;
pub mod connection;
pub mod error;

pub use client::Client;
pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
