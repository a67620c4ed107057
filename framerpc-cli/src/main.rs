//! framerpc-cli - Command-line interface for framerpc
//!
//! Issues one-shot calls against a running server.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use framerpc_client::{Client, ConnectionConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "framerpc-cli")]
#[command(about = "Command-line interface for framerpc servers")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8080", env = "FRAMERPC_SERVER")]
    server: SocketAddr,

    /// Seconds to wait for a reply (0 = wait forever)
    ///
    /// Servers send no reply for unknown methods, bad arguments or failed
    /// calls, so a missing reply shows up as a timeout.
    #[arg(short, long, default_value_t = 5)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call a method with JSON parameters
    Call {
        /// Qualified method name, e.g. Arithmetic.Add
        method: String,

        /// Parameters JSON (or @file.json to read from file)
        #[arg(default_value = "null")]
        params: String,

        /// Number of times to send the call
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
    },

    /// Add two integers with Arithmetic.Add
    Add {
        /// First operand
        #[arg(allow_negative_numbers = true)]
        a: i64,

        /// Second operand
        #[arg(allow_negative_numbers = true)]
        b: i64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ConnectionConfig::new();
    if cli.timeout > 0 {
        config = config.with_request_timeout(Duration::from_secs(cli.timeout));
    }

    let client = Client::connect_with_config(cli.server, config)
        .await
        .map_err(|e| {
            eprintln!("{}: {}", "Connection failed".red(), e);
            e
        })?;

    let result = commands::execute(&client, cli.command).await;

    match result {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }

    client.close().await?;

    Ok(())
}
