//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;

use rpc_over_quic::config::AppConfig;
use rpc_over_quic::lifecycle::Shutdown;
use rpc_over_quic::net::quic::{self, QuicDialer, QuicEndpointListener};
use rpc_over_quic::rpc::RpcServer;
use tempfile::TempDir;

/// Defaults with every listener on an ephemeral loopback port.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.server.quic_bind_address = "127.0.0.1:0".into();
    config.server.tcp_bind_address = "127.0.0.1:0".into();
    config.tls.subject_alt_names = vec!["localhost".into(), "127.0.0.1".into()];
    config
}

/// A QUIC server endpoint on loopback with an ephemeral certificate.
pub fn quic_endpoint() -> QuicEndpointListener {
    let config = test_config();
    let addr: SocketAddr = config.server.quic_bind_address.parse().unwrap();
    QuicEndpointListener::bind(addr, quic::server_config(&config).unwrap()).unwrap()
}

/// A client endpoint on loopback that skips certificate verification.
pub fn quic_dialer() -> QuicDialer {
    let config = test_config();
    QuicDialer::bind(
        "127.0.0.1:0".parse().unwrap(),
        quic::client_config(&config).unwrap(),
        config.client.server_name.clone(),
    )
    .unwrap()
}

/// A running RPC server serving files from a temporary directory.
pub struct TestServer {
    pub quic_addr: SocketAddr,
    pub tcp_addr: SocketAddr,
    pub root: TempDir,
    shutdown: Shutdown,
}

impl TestServer {
    /// Write a file under the served root.
    pub fn add_file(&self, name: &str, content: &[u8]) {
        std::fs::write(self.root.path().join(name), content).unwrap();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the RPC server on both transports.
pub async fn start_rpc_server() -> TestServer {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.server.file_root = root.path().to_string_lossy().into_owned();

    let quic_listener = RpcServer::bind_quic(&config).unwrap();
    let tcp_listener = RpcServer::bind_tcp(&config).await.unwrap();
    let quic_addr = quic_listener.local_addr().unwrap();
    let tcp_addr = tcp_listener.local_addr().unwrap();

    let server = RpcServer::from_config(&config);
    let shutdown = Shutdown::new();
    tokio::spawn(server.clone().serve_quic(quic_listener, shutdown.signalled()));
    tokio::spawn(server.serve_tcp(tcp_listener, shutdown.signalled()));

    TestServer {
        quic_addr,
        tcp_addr,
        root,
        shutdown,
    }
}
