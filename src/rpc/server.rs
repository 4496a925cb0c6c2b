//! RPC server setup.
//!
//! # Responsibilities
//! - Own the file service router
//! - Bind the QUIC (stream-socket) and TCP listeners from configuration
//! - Serve either listener with graceful shutdown

use std::future::Future;
use std::net::{AddrParseError, SocketAddr};

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::net::listener::SocketListener;
use crate::net::quic::{self, EndpointError, QuicEndpointListener};
use crate::net::transport::MuxListener;
use crate::rpc::service::FileService;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid address: {0}")]
    Address(#[from] AddrParseError),

    #[error("Failed to bind: {0}")]
    Bind(#[source] std::io::Error),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Runs the file service over QUIC and TCP listeners.
#[derive(Debug, Clone)]
pub struct RpcServer {
    router: Router,
}

impl RpcServer {
    pub fn new(service: FileService) -> Self {
        Self {
            router: service.router(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(FileService::from_config(&config.server))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind the QUIC endpoint and wrap it in a stream-socket listener with
    /// the configured stream accept timeout.
    pub fn bind_quic(config: &AppConfig) -> Result<SocketListener<QuicEndpointListener>, ServerError> {
        let addr: SocketAddr = config.server.quic_bind_address.parse()?;
        let endpoint = QuicEndpointListener::bind(addr, quic::server_config(config)?)?;
        Ok(SocketListener::new(endpoint)
            .with_stream_accept_timeout(config.quic.stream_accept_timeout()))
    }

    /// Bind the plain TCP listener used as the comparison baseline.
    pub async fn bind_tcp(config: &AppConfig) -> Result<TcpListener, ServerError> {
        let addr: SocketAddr = config.server.tcp_bind_address.parse()?;
        let listener = TcpListener::bind(addr).await.map_err(ServerError::Bind)?;
        if let Ok(local) = listener.local_addr() {
            tracing::info!(address = %local, "TCP listener bound");
        }
        Ok(listener)
    }

    /// Serve over QUIC until `shutdown` resolves.
    pub async fn serve_quic<L, F>(self, listener: SocketListener<L>, shutdown: F) -> Result<(), ServerError>
    where
        L: MuxListener,
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr().map_err(ServerError::Serve)?;
        tracing::info!(address = %addr, transport = "quic", "RPC server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ServerError::Serve)?;

        tracing::info!(address = %addr, transport = "quic", "RPC server stopped");
        Ok(())
    }

    /// Serve over TCP until `shutdown` resolves.
    pub async fn serve_tcp<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr().map_err(ServerError::Serve)?;
        tracing::info!(address = %addr, transport = "tcp", "RPC server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ServerError::Serve)?;

        tracing::info!(address = %addr, transport = "tcp", "RPC server stopped");
        Ok(())
    }
}
