//! TCP server implementation.

use crate::config::Config;
use crate::error::ServerError;
use crate::handler::ConnectionHandler;
use crate::registry::Registry;
use framerpc_protocol::PayloadCodec;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Largest accepted request payload (`None` = unlimited).
    pub max_payload_size: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, framerpc_protocol::DEFAULT_PORT)),
            max_connections: 1000,
            max_payload_size: None,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Builds the runtime configuration from a loaded [`Config`].
    pub fn from_config(config: &Config) -> Self {
        Self {
            bind_addr: config.network.bind_addr,
            max_connections: config.network.max_connections,
            max_payload_size: config.limits.max_payload(),
        }
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_max_payload_size(mut self, max: Option<u32>) -> Self {
        self.max_payload_size = max;
        self
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub connections_rejected: AtomicU64,
    pub requests_total: AtomicU64,
    pub replies_total: AtomicU64,
    pub requests_dropped: AtomicU64,
    pub errors_total: AtomicU64,
}

/// TCP server dispatching framed requests into a [`Registry`].
///
/// Every accepted connection is served by its own task; requests on one
/// connection are handled one at a time, in arrival order.
pub struct Server<C: PayloadCodec> {
    config: ServerConfig,
    handler: Arc<ConnectionHandler<C>>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    shutdown_requested: AtomicBool,
    running: AtomicBool,
}

impl<C: PayloadCodec> Server<C> {
    /// Creates a new server. The registry is frozen from here on.
    pub fn new(config: ServerConfig, registry: Registry<C>, codec: C) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let handler = ConnectionHandler::new(Arc::new(registry), Arc::new(codec))
            .with_max_payload_size(config.max_payload_size);
        Self {
            config,
            handler: Arc::new(handler),
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            shutdown_requested: AtomicBool::new(false),
            running: AtomicBool::new(false),
        }
    }

    /// Binds the configured address and serves until [`Server::shutdown`].
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serves connections accepted on `listener` until [`Server::shutdown`].
    ///
    /// Returns immediately if shutdown was requested before serving started.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        let mut shutdown_rx = self.shutdown.subscribe();
        if self.shutdown_requested.load(Ordering::SeqCst) {
            tracing::info!("Shutdown requested before serving, not listening on {}", local_addr);
            return Ok(());
        }
        self.running.store(true, Ordering::SeqCst);

        tracing::info!(
            "Server listening on {} ({} methods, codec={})",
            local_addr,
            self.handler.registry().len(),
            self.handler.codec().content_type()
        );

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((tcp_stream, addr)) => {
                            if self.stats.connections_active.load(Ordering::Relaxed)
                                >= self.config.max_connections as u64
                            {
                                tracing::warn!("Connection limit reached, rejecting {}", addr);
                                self.stats.connections_rejected.fetch_add(1, Ordering::Relaxed);
                                continue;
                            }

                            if let Err(e) = tcp_stream.set_nodelay(true) {
                                tracing::debug!("[{}] Failed to set TCP_NODELAY: {}", addr, e);
                            }

                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

                            let handler = self.handler.clone();
                            let stats = self.stats.clone();
                            let mut conn_shutdown = self.shutdown.subscribe();
                            let conn_id = Uuid::new_v4();

                            tokio::spawn(async move {
                                tracing::info!("Client connected: {} (conn={})", addr, conn_id);
                                let peer = addr.to_string();

                                match handler.run(tcp_stream, &peer, &stats, &mut conn_shutdown).await {
                                    Ok(summary) => {
                                        tracing::debug!(
                                            "[{}] Served {} requests ({} replied, {} dropped)",
                                            addr,
                                            summary.requests,
                                            summary.replies,
                                            summary.dropped
                                        );
                                    }
                                    Err(ServerError::ShuttingDown) => {}
                                    Err(e) => {
                                        tracing::debug!("Connection {} error: {}", addr, e);
                                        stats.errors_total.fetch_add(1, Ordering::Relaxed);
                                    }
                                }

                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                tracing::info!("Client disconnected: {} (conn={})", addr, conn_id);
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Initiates server shutdown. Open connections are closed as well.
    pub fn shutdown(&self) {
        // Flag first: `serve` subscribes before checking it
        self.shutdown_requested.store(true, Ordering::SeqCst);
        let _ = self.shutdown.send(());
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MethodError;
    use crate::registry::{MethodResult, Methods, Service};
    use framerpc_client::{Client, ClientError, ConnectionConfig};
    use framerpc_protocol::{encode_frame, read_frame, Envelope, JsonCodec};
    use serde::{Deserialize, Serialize};
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    struct Arithmetic;

    #[derive(Serialize, Deserialize)]
    struct AddArgs {
        a: i64,
        b: i64,
    }

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct AddReply {
        result: i64,
    }

    impl Arithmetic {
        fn add(&self, args: AddArgs, reply: &mut AddReply) -> MethodResult {
            reply.result = args.a + args.b;
            Ok(())
        }

        fn div(&self, args: AddArgs, reply: &mut AddReply) -> MethodResult {
            if args.b == 0 {
                return Err(MethodError::new("division by zero"));
            }
            reply.result = args.a / args.b;
            Ok(())
        }
    }

    impl Service for Arithmetic {
        fn register_methods<C: PayloadCodec>(methods: &mut Methods<'_, Self, C>) {
            methods.method("Add", Self::add).method("Div", Self::div);
        }
    }

    async fn start_server(config: ServerConfig) -> (Arc<Server<JsonCodec>>, SocketAddr) {
        let mut registry = Registry::new();
        registry.register(Arithmetic).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = Arc::new(Server::new(config, registry, JsonCodec));
        let task_server = server.clone();
        tokio::spawn(async move { task_server.serve(listener).await });

        (server, addr)
    }

    async fn default_server() -> (Arc<Server<JsonCodec>>, SocketAddr) {
        start_server(ServerConfig::new("127.0.0.1:0".parse().unwrap())).await
    }

    fn add_request(a: i64, b: i64) -> Vec<u8> {
        let codec = JsonCodec;
        let params = codec.encode(&AddArgs { a, b }).unwrap();
        codec
            .encode_envelope(&Envelope::new("Arithmetic.Add", params))
            .unwrap()
    }

    #[test]
    fn test_config_from_loaded_config() {
        let mut config = Config::default();
        config.network.max_connections = 3;
        config.limits.max_payload_size = 1024;

        let server_config = ServerConfig::from_config(&config);
        assert_eq!(server_config.bind_addr, config.network.bind_addr);
        assert_eq!(server_config.max_connections, 3);
        assert_eq!(server_config.max_payload_size, Some(1024));
    }

    #[tokio::test]
    async fn test_server_not_running_before_serve() {
        let server = Server::new(ServerConfig::default(), Registry::new(), JsonCodec);
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_before_serve() {
        let mut registry = Registry::new();
        registry.register(Arithmetic).unwrap();
        let server = Server::new(
            ServerConfig::new("127.0.0.1:0".parse().unwrap()),
            registry,
            JsonCodec,
        );
        server.shutdown();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), server.serve(listener))
            .await
            .unwrap()
            .unwrap();
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_add_over_tcp() {
        let (server, addr) = default_server().await;

        let client = Client::connect(addr).await.unwrap();
        let reply: AddReply = client
            .call("Arithmetic.Add", &AddArgs { a: 3, b: 4 })
            .await
            .unwrap();
        assert_eq!(reply.result, 7);

        server.shutdown();
    }

    #[tokio::test]
    async fn test_sequence_id_echoed() {
        let (server, addr) = default_server().await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let frame = encode_frame(0xDEAD_BEEF, &add_request(1, 2)).unwrap();
        stream.write_all(&frame).await.unwrap();

        let reply = read_frame(&mut stream).await.unwrap();
        assert_eq!(reply.sequence_id, 0xDEAD_BEEF);
        let reply: AddReply = serde_json::from_slice(&reply.payload).unwrap();
        assert_eq!(reply.result, 3);

        server.shutdown();
    }

    #[tokio::test]
    async fn test_failed_request_gets_no_reply() {
        let (server, addr) = default_server().await;

        let client = Client::connect_with_config(
            addr,
            ConnectionConfig::default().with_request_timeout(Duration::from_millis(200)),
        )
        .await
        .unwrap();

        let result: Result<AddReply, _> = client
            .call("Arithmetic.Mul", &AddArgs { a: 3, b: 4 })
            .await;
        assert!(matches!(result, Err(ClientError::Timeout)));
        client.reconnect().await.unwrap();

        let result: Result<AddReply, _> = client
            .call("Arithmetic.Div", &AddArgs { a: 3, b: 0 })
            .await;
        assert!(matches!(result, Err(ClientError::Timeout)));
        client.reconnect().await.unwrap();

        let reply: AddReply = client
            .call("Arithmetic.Div", &AddArgs { a: 12, b: 4 })
            .await
            .unwrap();
        assert_eq!(reply.result, 3);

        assert_eq!(server.stats().requests_dropped.load(Ordering::Relaxed), 2);
        assert_eq!(server.stats().connections_total.load(Ordering::Relaxed), 3);

        server.shutdown();
    }

    #[tokio::test]
    async fn test_concurrent_clients() {
        let (server, addr) = default_server().await;

        let mut tasks = Vec::new();
        for i in 0..8i64 {
            tasks.push(tokio::spawn(async move {
                let client = Client::connect(addr).await.unwrap();
                for j in 0..10i64 {
                    let reply: AddReply = client
                        .call("Arithmetic.Add", &AddArgs { a: i, b: j })
                        .await
                        .unwrap();
                    assert_eq!(reply.result, i + j);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(server.stats().connections_total.load(Ordering::Relaxed), 8);
        assert_eq!(server.stats().requests_total.load(Ordering::Relaxed), 80);

        server.shutdown();
    }

    #[tokio::test]
    async fn test_pipelined_replies_in_order() {
        let (server, addr) = default_server().await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        for seq in 1..=10u32 {
            let frame = encode_frame(seq, &add_request(seq as i64, 100)).unwrap();
            stream.write_all(&frame).await.unwrap();
        }

        for seq in 1..=10u32 {
            let reply = read_frame(&mut stream).await.unwrap();
            assert_eq!(reply.sequence_id, seq);
            let reply: AddReply = serde_json::from_slice(&reply.payload).unwrap();
            assert_eq!(reply.result, seq as i64 + 100);
        }

        server.shutdown();
    }

    #[tokio::test]
    async fn test_bad_magic_closes_only_that_connection() {
        let (server, addr) = default_server().await;

        let mut bad = TcpStream::connect(addr).await.unwrap();
        let mut frame = encode_frame(1, &add_request(1, 1)).unwrap();
        frame[..4].copy_from_slice(&0xDEAD_BEEFu32.to_be_bytes());
        bad.write_all(&frame).await.unwrap();

        // Server closes the bad connection
        let result = tokio::time::timeout(Duration::from_secs(2), read_frame(&mut bad))
            .await
            .unwrap();
        assert!(result.is_err());

        // Other connections are unaffected
        let client = Client::connect(addr).await.unwrap();
        let reply: AddReply = client
            .call("Arithmetic.Add", &AddArgs { a: 5, b: 5 })
            .await
            .unwrap();
        assert_eq!(reply.result, 10);

        server.shutdown();
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let (server, addr) =
            start_server(ServerConfig::new("127.0.0.1:0".parse().unwrap()).with_max_connections(1))
                .await;

        let first = Client::connect(addr).await.unwrap();
        let _: AddReply = first
            .call("Arithmetic.Add", &AddArgs { a: 1, b: 1 })
            .await
            .unwrap();

        // The second connection is accepted by the OS, then dropped by the server
        let mut second = TcpStream::connect(addr).await.unwrap();
        second
            .write_all(&encode_frame(1, &add_request(1, 1)).unwrap())
            .await
            .unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), read_frame(&mut second))
            .await
            .unwrap();
        assert!(result.is_err());
        assert_eq!(server.stats().connections_rejected.load(Ordering::Relaxed), 1);

        server.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_stops_serving() {
        let (server, addr) = default_server().await;

        let client = Client::connect(addr).await.unwrap();
        let _: AddReply = client
            .call("Arithmetic.Add", &AddArgs { a: 1, b: 1 })
            .await
            .unwrap();
        assert!(server.is_running());

        server.shutdown();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!server.is_running());
    }
}
