//! Server error types.

use framerpc_protocol::{CodecError, ProtocolError};
use thiserror::Error;

/// Failure reported by an RPC method through its status return.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct MethodError {
    message: String,
}

impl MethodError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for MethodError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for MethodError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Errors rejecting a service at registration time.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid service name: {0:?}")]
    InvalidServiceName(String),

    #[error("invalid method name {method:?} on service {service}")]
    InvalidMethodName { service: String, method: String },

    #[error("service {0} exposes no methods")]
    NoMethods(String),
}

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("envelope decode failed: {0}")]
    EnvelopeDecode(#[source] CodecError),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("argument decode failed for {method}: {source}")]
    ArgumentDecode {
        method: String,
        #[source]
        source: CodecError,
    },

    #[error("method {method} failed: {source}")]
    MethodInvocation {
        method: String,
        #[source]
        source: MethodError,
    },

    #[error("reply encode failed for {method}: {source}")]
    ReplyEncode {
        method: String,
        #[source]
        source: CodecError,
    },

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("server shutting down")]
    ShuttingDown,
}

impl ServerError {
    /// Returns whether this error ends the connection it occurred on.
    ///
    /// Non-fatal errors only drop the request that caused them.
    pub fn is_fatal(&self) -> bool {
        match self {
            ServerError::Io(_)
            | ServerError::Protocol(_)
            | ServerError::Registry(_)
            | ServerError::ShuttingDown => true,
            ServerError::EnvelopeDecode(_)
            | ServerError::MethodNotFound(_)
            | ServerError::ArgumentDecode { .. }
            | ServerError::MethodInvocation { .. }
            | ServerError::ReplyEncode { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_error() {
        let err = MethodError::from("division by zero");
        assert_eq!(err.message(), "division by zero");
        assert_eq!(err.to_string(), "division by zero");
    }

    #[test]
    fn test_fatality() {
        assert!(ServerError::Protocol(ProtocolError::InvalidMagic(0)).is_fatal());
        assert!(ServerError::Io(std::io::ErrorKind::BrokenPipe.into()).is_fatal());
        assert!(ServerError::ShuttingDown.is_fatal());

        assert!(!ServerError::MethodNotFound("Nope.Nope".into()).is_fatal());
        assert!(!ServerError::EnvelopeDecode(CodecError::decode("bad")).is_fatal());
        assert!(!ServerError::MethodInvocation {
            method: "Arithmetic.Div".into(),
            source: MethodError::new("division by zero"),
        }
        .is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = ServerError::MethodNotFound("Arithmetic.Mul".into());
        assert_eq!(err.to_string(), "method not found: Arithmetic.Mul");

        let err = ServerError::MethodInvocation {
            method: "Arithmetic.Div".into(),
            source: MethodError::new("division by zero"),
        };
        assert_eq!(
            err.to_string(),
            "method Arithmetic.Div failed: division by zero"
        );

        let err = RegistryError::InvalidMethodName {
            service: "Arithmetic".into(),
            method: "a.b".into(),
        };
        assert!(err.to_string().contains("\"a.b\""));
    }
}
