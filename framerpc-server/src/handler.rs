//! Per-connection request handling.
//!
//! Each connection runs a strictly sequential loop:
//!
//! ```text
//! AwaitingFrame -> DecodingEnvelope -> ResolvingMethod -> DecodingArgs
//!     -> Invoking -> EncodingReply -> SendingFrame -> AwaitingFrame
//! ```
//!
//! Framing and transport errors close the connection. Everything that goes
//! wrong above the framing layer (undecodable envelope, unknown method, bad
//! arguments, method failure) is logged and the request is dropped without a
//! reply; the connection then waits for the next frame. The peer only sees a
//! missing reply.

use crate::error::ServerError;
use crate::registry::Registry;
use crate::server::ServerStats;
use framerpc_protocol::{read_frame_with_limit, write_frame, Frame, PayloadCodec};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;

/// Counters for a single connection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSummary {
    /// Frames received.
    pub requests: u64,
    /// Replies written.
    pub replies: u64,
    /// Requests dropped without a reply.
    pub dropped: u64,
}

/// Runs the frame/dispatch loop for connections.
pub struct ConnectionHandler<C> {
    registry: Arc<Registry<C>>,
    codec: Arc<C>,
    max_payload_size: Option<u32>,
}

impl<C: PayloadCodec> ConnectionHandler<C> {
    /// Creates a handler dispatching into `registry`.
    pub fn new(registry: Arc<Registry<C>>, codec: Arc<C>) -> Self {
        Self {
            registry,
            codec,
            max_payload_size: None,
        }
    }

    /// Rejects request frames larger than `max` bytes by closing the connection.
    pub fn with_max_payload_size(mut self, max: Option<u32>) -> Self {
        self.max_payload_size = max;
        self
    }

    pub fn registry(&self) -> &Registry<C> {
        &self.registry
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Turns one request payload into an encoded reply.
    ///
    /// Every error returned here is request-scoped (see
    /// [`ServerError::is_fatal`]).
    pub fn handle_request(&self, payload: &[u8]) -> Result<Vec<u8>, ServerError> {
        let envelope = self
            .codec
            .decode_envelope(payload)
            .map_err(ServerError::EnvelopeDecode)?;

        let method = self
            .registry
            .resolve(&envelope.method)
            .ok_or_else(|| ServerError::MethodNotFound(envelope.method.clone()))?;

        method.invoke(&self.codec, &envelope.params)
    }

    /// Serves requests from `stream` until the peer disconnects, a framing or
    /// transport error occurs, or `shutdown` fires.
    ///
    /// A clean disconnect returns `Ok` with the connection's counters.
    pub async fn run<S>(
        &self,
        mut stream: S,
        peer: &str,
        stats: &ServerStats,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<ConnectionSummary, ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut summary = ConnectionSummary::default();

        loop {
            let frame = tokio::select! {
                result = read_frame_with_limit(&mut stream, self.max_payload_size) => {
                    match result {
                        Ok(frame) => frame,
                        Err(e) if e.is_disconnect() => {
                            tracing::debug!("[{}] Connection closed by client", peer);
                            return Ok(summary);
                        }
                        Err(e) => {
                            tracing::debug!("[{}] Read error: {}", peer, e);
                            return Err(e.into());
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("[{}] Shutdown signal received", peer);
                    return Err(ServerError::ShuttingDown);
                }
            };

            summary.requests += 1;
            stats.requests_total.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                "[{}] Received frame seq={} ({} bytes)",
                peer,
                frame.sequence_id,
                frame.payload.len()
            );

            match self.handle_request(&frame.payload) {
                Ok(reply) => {
                    let reply_len = reply.len();
                    write_frame(&mut stream, &Frame::new(frame.sequence_id, reply)).await?;
                    summary.replies += 1;
                    stats.replies_total.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        "[{}] Replied seq={} ({} bytes)",
                        peer,
                        frame.sequence_id,
                        reply_len
                    );
                }
                Err(e) => {
                    summary.dropped += 1;
                    stats.requests_dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        "[{}] Dropping request seq={}: {}",
                        peer,
                        frame.sequence_id,
                        e
                    );
                }
            }
        }
    }
}
