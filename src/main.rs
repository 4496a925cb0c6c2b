//! RPC over QUIC: server
//!
//! Serves the file service on two transports side by side.
//!
//! # Architecture Overview
//!
//! ```text
//!   QUIC client ──▶ quinn endpoint ──▶ SocketListener ──┐
//!                                      (1st stream)     │
//!                                                       ▼
//!                                              axum HTTP/2 FileService
//!                                                       ▲
//!   TCP client  ──▶ TcpListener ────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use rpc_over_quic::config::validation::validate_config;
use rpc_over_quic::config::{load_or_default, ConfigError};
use rpc_over_quic::lifecycle::{signals, Shutdown};
use rpc_over_quic::observability::init_logging;
use rpc_over_quic::rpc::RpcServer;

#[derive(Parser)]
#[command(name = "rpc-over-quic")]
#[command(about = "File service over QUIC and TCP", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override server.quic_bind_address
    #[arg(long)]
    quic_bind: Option<String>,

    /// Override server.tcp_bind_address
    #[arg(long)]
    tcp_bind: Option<String>,

    /// Override server.file_root
    #[arg(long)]
    file_root: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_or_default(cli.config.as_deref())?;
    if let Some(addr) = cli.quic_bind {
        config.server.quic_bind_address = addr;
    }
    if let Some(addr) = cli.tcp_bind {
        config.server.tcp_bind_address = addr;
    }
    if let Some(root) = cli.file_root {
        config.server.file_root = root;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    init_logging(&config.observability)?;
    tracing::info!("rpc-over-quic v0.1.0 starting");
    tracing::info!(
        quic_bind_address = %config.server.quic_bind_address,
        tcp_bind_address = %config.server.tcp_bind_address,
        file_root = %config.server.file_root,
        alpn = %config.quic.alpn,
        "Configuration loaded"
    );

    let quic_listener = RpcServer::bind_quic(&config)?;
    let tcp_listener = RpcServer::bind_tcp(&config).await?;
    let server = RpcServer::from_config(&config);

    let shutdown = Shutdown::new();
    tokio::spawn(signals::wait_for_ctrl_c(shutdown.clone()));

    tokio::try_join!(
        server.clone().serve_quic(quic_listener, shutdown.signalled()),
        server.serve_tcp(tcp_listener, shutdown.signalled()),
    )?;

    tracing::info!("Shutdown complete");
    Ok(())
}
