//! Payload codecs.
//!
//! The framing layer treats payloads as opaque bytes. A [`PayloadCodec`]
//! turns values into those bytes and back, and knows how to wrap encoded
//! parameters into a request [`Envelope`] without decoding them.

use crate::error::CodecError;
use crate::message::Envelope;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Encoding used for envelopes, arguments and replies.
///
/// Implementations must round-trip every argument and reply type registered
/// with a server using them.
pub trait PayloadCodec: Send + Sync + 'static {
    /// Short tag naming the encoding, e.g. `"json"`.
    fn content_type(&self) -> &'static str;

    /// Encodes a value.
    fn encode<T>(&self, value: &T) -> Result<Vec<u8>, CodecError>
    where
        T: Serialize + ?Sized;

    /// Decodes a value of type `T`.
    fn decode<T>(&self, bytes: &[u8]) -> Result<T, CodecError>
    where
        T: DeserializeOwned;

    /// Encodes an envelope whose `params` were produced by [`Self::encode`].
    fn encode_envelope(&self, envelope: &Envelope) -> Result<Vec<u8>, CodecError>;

    /// Decodes the outer envelope, leaving `params` encoded.
    fn decode_envelope(&self, bytes: &[u8]) -> Result<Envelope, CodecError>;
}

/// JSON codec backed by `serde_json`.
///
/// Envelopes look like `{"method":"Arithmetic.Add","params":{"a":3,"b":4}}`;
/// `params` is carried as a raw JSON value so it is only parsed once the
/// target type is known.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[derive(Serialize)]
struct JsonEnvelopeRef<'a> {
    method: &'a str,
    params: &'a RawValue,
}

#[derive(Deserialize)]
struct JsonEnvelope {
    method: String,
    #[serde(default)]
    params: Option<Box<RawValue>>,
}

const JSON_NULL: &str = "null";

impl PayloadCodec for JsonCodec {
    fn content_type(&self) -> &'static str {
        "json"
    }

    fn encode<T>(&self, value: &T) -> Result<Vec<u8>, CodecError>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_vec(value).map_err(CodecError::encode)
    }

    fn decode<T>(&self, bytes: &[u8]) -> Result<T, CodecError>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(bytes).map_err(CodecError::decode)
    }

    fn encode_envelope(&self, envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
        let params = if envelope.params.is_empty() {
            JSON_NULL
        } else {
            std::str::from_utf8(&envelope.params).map_err(CodecError::encode)?
        };
        let params: Box<RawValue> =
            RawValue::from_string(params.to_owned()).map_err(CodecError::encode)?;

        serde_json::to_vec(&JsonEnvelopeRef {
            method: &envelope.method,
            params: &params,
        })
        .map_err(CodecError::encode)
    }

    fn decode_envelope(&self, bytes: &[u8]) -> Result<Envelope, CodecError> {
        let raw: JsonEnvelope = serde_json::from_slice(bytes).map_err(CodecError::decode)?;
        if raw.method.is_empty() {
            return Err(CodecError::InvalidEnvelope("empty method name".to_string()));
        }

        let params = raw
            .params
            .map(|p| Bytes::copy_from_slice(p.get().as_bytes()))
            .unwrap_or_else(|| Bytes::from_static(JSON_NULL.as_bytes()));

        Ok(Envelope {
            method: raw.method,
            params,
        })
    }
}
