//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server,
//! the benchmark client and the transport they share.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server bind addresses and service settings.
    pub server: ServerConfig,

    /// Addresses and TLS trust settings used by the client.
    pub client: ClientConfig,

    /// QUIC transport settings shared by both sides.
    pub quic: QuicConfig,

    /// Server certificate material.
    pub tls: TlsConfig,

    /// Benchmark harness settings.
    pub bench: BenchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// QUIC bind address (e.g., "0.0.0.0:4242").
    pub quic_bind_address: String,

    /// Plain TCP bind address (e.g., "0.0.0.0:4243").
    pub tcp_bind_address: String,

    /// Directory `StreamFile` resolves file names against.
    pub file_root: String,

    /// Largest accepted RPC message, in bytes.
    pub max_message_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            quic_bind_address: "0.0.0.0:4242".to_string(),
            tcp_bind_address: "0.0.0.0:4243".to_string(),
            file_root: ".".to_string(),
            max_message_bytes: 4 * 1024 * 1024, // 4MB
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server QUIC address to dial.
    pub quic_address: String,

    /// Server TCP address to dial.
    pub tcp_address: String,

    /// Name presented for SNI and certificate verification.
    pub server_name: String,

    /// Accept any server certificate.
    pub insecure_skip_verify: bool,

    /// Optional PEM bundle of trusted roots, used when verification is on.
    pub ca_cert_path: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            quic_address: "127.0.0.1:4242".to_string(),
            tcp_address: "127.0.0.1:4243".to_string(),
            server_name: "localhost".to_string(),
            // Server certificates are ephemeral and self-signed by default.
            insecure_skip_verify: true,
            ca_cert_path: None,
        }
    }
}

/// QUIC transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QuicConfig {
    /// ALPN identifier both peers must advertise.
    pub alpn: String,

    /// How long an accepted connection may go without opening a stream.
    /// `None` waits forever.
    pub stream_accept_timeout_secs: Option<u64>,

    /// Idle timeout in seconds.
    pub idle_timeout_secs: u64,

    /// Keep-alive interval in seconds.
    pub keep_alive_secs: Option<u64>,
}

impl Default for QuicConfig {
    fn default() -> Self {
        Self {
            alpn: "h3".to_string(),
            stream_accept_timeout_secs: Some(10),
            idle_timeout_secs: 30,
            keep_alive_secs: Some(5),
        }
    }
}

impl QuicConfig {
    pub fn stream_accept_timeout(&self) -> Option<Duration> {
        self.stream_accept_timeout_secs.map(Duration::from_secs)
    }
}

/// TLS configuration for the QUIC listener.
///
/// With both paths unset the server generates an ephemeral certificate.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: Option<String>,

    /// Path to private key file (PEM).
    pub key_path: Option<String>,

    /// Subject alternative names of the ephemeral certificate.
    pub subject_alt_names: Vec<String>,

    /// Validity window of the ephemeral certificate in hours.
    pub ephemeral_validity_hours: u64,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: None,
            key_path: None,
            subject_alt_names: vec!["127.0.0.1".to_string()],
            ephemeral_validity_hours: 24,
        }
    }
}

/// Benchmark configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Size of the random query payload in bytes.
    pub payload_size: usize,

    /// Number of fresh connections per transport.
    pub iterations: u32,

    /// Unary calls issued on each connection.
    pub calls_per_iteration: u32,

    /// Upper bound for one transport's whole run, in seconds.
    pub timeout_secs: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            payload_size: 512 * 1024,
            iterations: 3,
            calls_per_iteration: 30,
            timeout_secs: 600,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error), overridden by `RUST_LOG`.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            tcp_bind_address = "127.0.0.1:9000"

            [quic]
            alpn = "rpc"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.tcp_bind_address, "127.0.0.1:9000");
        assert_eq!(config.server.quic_bind_address, "0.0.0.0:4242");
        assert_eq!(config.quic.alpn, "rpc");
        assert_eq!(config.quic.stream_accept_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.bench.payload_size, 512 * 1024);
    }
}
