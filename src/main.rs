//! framerpc - framed RPC server
//!
//! Serves the registered services over TCP until interrupted.

mod arithmetic;

use arithmetic::Arithmetic;
use framerpc_protocol::JsonCodec;
use framerpc_server::config::CONFIG_ENV;
use framerpc_server::{Config, Registry, Server, ServerConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if FRAMERPC_CONFIG is set, then env overrides)
    let config_path = std::env::var(CONFIG_ENV).ok();
    let config = match Config::load() {
        Ok(c) => {
            if let Some(ref path) = config_path {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            // If a config file was explicitly specified, fail on error
            if config_path.is_some() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::warn!("Invalid configuration ({}), using defaults", e);
            Config::default()
        }
    };

    let mut registry = Registry::new();
    registry.register(Arithmetic)?;

    let server_config = ServerConfig::from_config(&config);

    tracing::info!("Starting framerpc server");
    tracing::info!("  Bind address: {}", server_config.bind_addr);
    tracing::info!("  Max connections: {}", server_config.max_connections);
    match server_config.max_payload_size {
        Some(max) => tracing::info!("  Max payload size: {} bytes", max),
        None => tracing::info!("  Max payload size: unlimited"),
    }
    for name in registry.method_names() {
        tracing::info!("  Method: {}", name);
    }

    let server = Arc::new(Server::new(server_config, registry, JsonCodec));

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown)
    server.run().await?;

    let stats = server.stats();
    tracing::info!(
        "Server stopped ({} connections, {} requests, {} dropped)",
        stats
            .connections_total
            .load(std::sync::atomic::Ordering::Relaxed),
        stats.requests_total.load(std::sync::atomic::Ordering::Relaxed),
        stats
            .requests_dropped
            .load(std::sync::atomic::Ordering::Relaxed)
    );
    Ok(())
}
