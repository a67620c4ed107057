//! Connection management.

use crate::error::ClientError;
use bytes::Bytes;
use framerpc_protocol::{encode_frame, read_frame};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Time to wait for a reply. `None` waits indefinitely.
    ///
    /// Servers drop failed requests without replying, so without a timeout a
    /// call to an unknown or failing method never completes.
    pub request_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

/// A framed connection to a framerpc server.
///
/// Each connection owns its sequence counter. Calls are serialised: the
/// stream stays locked from writing a request until its reply frame has been
/// read, so replies are never interleaved between callers.
pub struct Connection {
    addr: SocketAddr,
    config: ConnectionConfig,
    stream: Mutex<Option<TcpStream>>,
    next_seq: AtomicU32,
    connected: AtomicBool,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(addr: SocketAddr, config: ConnectionConfig) -> Self {
        Self {
            addr,
            config,
            stream: Mutex::new(None),
            next_seq: AtomicU32::new(0),
            connected: AtomicBool::new(false),
        }
    }

    /// Connects to the server.
    pub async fn connect(&self) -> Result<(), ClientError> {
        tracing::debug!("Connecting to {}...", self.addr);

        let tcp_stream =
            tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(self.addr))
                .await
                .map_err(|_| {
                    tracing::debug!("Connection timeout");
                    ClientError::Timeout
                })?
                .map_err(|e| {
                    tracing::debug!("Connection failed: {}", e);
                    ClientError::Io(e)
                })?;

        tcp_stream.set_nodelay(true).ok();

        *self.stream.lock().await = Some(tcp_stream);
        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!("Connected to {}", self.addr);

        Ok(())
    }

    /// Sends one encoded envelope and reads exactly one reply frame.
    ///
    /// Returns the sequence id the request was sent with and the reply
    /// payload. The reply's own sequence id is not checked against the
    /// request's; replies on a connection arrive in request order.
    ///
    /// A timeout closes the connection, so a late reply can never be read as
    /// the answer to a later call. Call [`Connection::connect`] to reconnect;
    /// the sequence counter carries on.
    pub async fn call_raw(&self, payload: &[u8]) -> Result<(u32, Bytes), ClientError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ClientError::NotConnected);
        }

        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(ClientError::NotConnected)?;

        let seq = self.next_sequence_id();
        let frame = encode_frame(seq, payload)?;

        let exchange = async {
            stream.write_all(&frame).await?;
            stream.flush().await?;
            tracing::debug!("Request seq={} sent ({} bytes)", seq, payload.len());
            read_frame(&mut *stream).await.map_err(ClientError::from)
        };

        let result = match self.config.request_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, exchange).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::debug!("Request seq={} timed out", seq);
                    Err(ClientError::Timeout)
                }
            },
            None => exchange.await,
        };

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                if e.is_connection_error() {
                    tracing::debug!("Request seq={} failed, dropping connection: {}", seq, e);
                    *guard = None;
                    self.connected.store(false, Ordering::SeqCst);
                }
                return Err(e);
            }
        };

        if reply.sequence_id != seq {
            tracing::warn!(
                "Reply sequence id {} does not match request {}",
                reply.sequence_id,
                seq
            );
        }
        tracing::debug!("Request seq={} got reply ({} bytes)", seq, reply.payload.len());

        Ok((seq, reply.payload))
    }

    /// Advances the sequence counter and returns the new value.
    ///
    /// The first request on a connection uses 1; the counter wraps after
    /// `u32::MAX`.
    fn next_sequence_id(&self) -> u32 {
        self.next_seq.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    /// Returns the sequence id used by the most recent request (0 before any).
    pub fn last_sequence_id(&self) -> u32 {
        self.next_seq.load(Ordering::SeqCst)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.connected.store(false, Ordering::SeqCst);

        if let Some(mut stream) = self.stream.lock().await.take() {
            tracing::debug!("Shutting down connection to {}", self.addr);
            let _ = stream.shutdown().await;
        }

        Ok(())
    }
}
