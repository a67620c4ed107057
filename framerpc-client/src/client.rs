//! High-level client API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use framerpc_protocol::{Envelope, JsonCodec, PayloadCodec};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

/// High-level client for framerpc.
///
/// Encodes parameters and decodes replies with the codec the server uses
/// (JSON by default).
pub struct Client<C = JsonCodec> {
    conn: Arc<Connection>,
    codec: C,
}

impl Client<JsonCodec> {
    /// Connects to `addr` with the default configuration and the JSON codec.
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        Self::connect_with_config(addr, ConnectionConfig::default()).await
    }

    /// Connects to `addr` with the JSON codec.
    pub async fn connect_with_config(
        addr: SocketAddr,
        config: ConnectionConfig,
    ) -> Result<Self, ClientError> {
        Self::connect_with_codec(addr, config, JsonCodec).await
    }
}

impl<C: PayloadCodec> Client<C> {
    /// Connects to `addr` using `codec` for envelopes, parameters and replies.
    pub async fn connect_with_codec(
        addr: SocketAddr,
        config: ConnectionConfig,
        codec: C,
    ) -> Result<Self, ClientError> {
        let conn = Connection::new(addr, config);
        conn.connect().await?;
        Ok(Self {
            conn: Arc::new(conn),
            codec,
        })
    }

    /// Calls `method` (`"Service.Method"`) and decodes its reply.
    ///
    /// A server that fails to handle the request sends nothing back, so the
    /// call only completes with an error if the connection breaks or the
    /// configured request timeout expires.
    pub async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, ClientError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let reply = self.call_encoded(method, params).await?;
        Ok(self.codec.decode(&reply)?)
    }

    /// Calls `method` and returns the undecoded reply payload.
    pub async fn call_encoded<P>(
        &self,
        method: &str,
        params: &P,
    ) -> Result<bytes::Bytes, ClientError>
    where
        P: Serialize + ?Sized,
    {
        let params = self.codec.encode(params)?;
        let request = self.codec.encode_envelope(&Envelope::new(method, params))?;

        tracing::debug!("Calling {} ({} bytes)", method, request.len());
        let (_, reply) = self.conn.call_raw(&request).await?;
        Ok(reply)
    }

    /// Opens a fresh connection to the same server, replacing the old one.
    ///
    /// Needed after a timeout or a broken connection.
    pub async fn reconnect(&self) -> Result<(), ClientError> {
        self.conn.connect().await
    }

    /// Returns whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.close().await
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> Arc<Connection> {
        self.conn.clone()
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }
}
