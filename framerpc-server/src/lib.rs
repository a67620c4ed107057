//! # framerpc-server
//!
//! TCP server for framerpc.
//!
//! This crate provides:
//! - The method registry, mapping `"Service.Method"` names to typed handlers
//! - The per-connection frame/dispatch loop
//! - The accept loop, spawning one task per connection
//! - YAML + environment configuration

pub mod config;
pub mod error;
pub mod handler;
pub mod registry;
pub mod server;

pub use config::{Config, ConfigError, LimitsConfig, NetworkConfig};
pub use error::{MethodError, RegistryError, ServerError};
pub use handler::ConnectionHandler;
pub use registry::{MethodDescriptor, MethodResult, Methods, Registry, Service};
pub use server::{Server, ServerConfig, ServerStats};
