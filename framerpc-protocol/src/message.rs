//! Request envelope.

use bytes::Bytes;

/// Request envelope: a qualified method name plus still-encoded parameters.
///
/// `params` stays opaque until the server has resolved `method`; only then is
/// it decoded into the argument type that method declares. Replies carry no
/// envelope, just the encoded reply value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// `"<Service>.<Method>"`.
    pub method: String,
    /// Codec-encoded argument value.
    pub params: Bytes,
}

impl Envelope {
    pub fn new(method: impl Into<String>, params: impl Into<Bytes>) -> Self {
        Self {
            method: method.into(),
            params: params.into(),
        }
    }

    /// Splits the method name into its service and method parts.
    ///
    /// Returns `None` unless both parts are non-empty.
    pub fn split_method(&self) -> Option<(&str, &str)> {
        self.method
            .split_once('.')
            .filter(|(service, method)| !service.is_empty() && !method.is_empty())
    }
}
