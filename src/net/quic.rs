//! QUIC binding of the transport capability traits.
//!
//! # Responsibilities
//! - Wrap quinn connections and bidirectional streams
//! - Accept inbound sessions on a server endpoint
//! - Dial outbound sessions and hand back ready-to-use sockets
//! - Build endpoint configs from [`AppConfig`]

use std::io;
use std::net::{AddrParseError, SocketAddr};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use quinn::crypto::rustls::{QuicClientConfig, QuicServerConfig};
use quinn::{Endpoint, IdleTimeout, RecvStream, SendStream, TransportConfig, VarInt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Instant;

use crate::config::{AppConfig, QuicConfig};
use crate::net::deadline::Deadline;
use crate::net::socket::StreamSocket;
use crate::net::tls::{self, CertificateMaterial, ServerVerification, TlsError};
use crate::net::transport::{MuxConnection, MuxListener, MuxStream};

/// Errors raised while building or binding a QUIC endpoint.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("Invalid address: {0}")]
    Address(#[from] AddrParseError),

    #[error("Failed to bind endpoint: {0}")]
    Bind(#[source] io::Error),

    #[error("Idle timeout out of range: {0}")]
    IdleTimeout(#[from] quinn::VarIntBoundsExceeded),

    #[error(transparent)]
    Tls(#[from] TlsError),
}

/// Errors raised while dialing a server.
#[derive(Debug, Error)]
pub enum DialError {
    /// The connection attempt could not be started (bad server name, closed
    /// endpoint, ...).
    #[error("Failed to start connection: {0}")]
    Connect(#[from] quinn::ConnectError),

    /// Handshake or session failure.
    #[error("Connection failed: {0}")]
    Connection(#[from] quinn::ConnectionError),

    /// The client endpoint's socket could not be queried.
    #[error("Client endpoint error: {0}")]
    Endpoint(#[source] io::Error),

    /// The session came up but no stream could be opened on it.
    #[error("Failed to open stream: {0}")]
    Stream(#[source] io::Error),
}

/// Map a session error onto the closest I/O error kind, keeping the quinn
/// error as the source.
fn connection_error(err: quinn::ConnectionError) -> io::Error {
    use quinn::ConnectionError::*;

    let kind = match &err {
        TimedOut => io::ErrorKind::TimedOut,
        Reset => io::ErrorKind::ConnectionReset,
        ApplicationClosed(_) | ConnectionClosed(_) | LocallyClosed => {
            io::ErrorKind::ConnectionAborted
        }
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, err)
}

/// A quinn connection plus the local address it was established on.
#[derive(Debug, Clone)]
pub struct QuicConnection {
    inner: quinn::Connection,
    local_addr: SocketAddr,
}

impl QuicConnection {
    /// `endpoint_addr` is the address the owning endpoint is bound to. When
    /// the platform reports the connection's own local IP (wildcard binds),
    /// that IP replaces the endpoint's.
    pub fn new(inner: quinn::Connection, endpoint_addr: SocketAddr) -> Self {
        let ip = inner.local_ip().unwrap_or(endpoint_addr.ip());
        Self {
            inner,
            local_addr: SocketAddr::new(ip, endpoint_addr.port()),
        }
    }
}

impl MuxConnection for QuicConnection {
    type Stream = QuicStream;

    fn open_stream(&self) -> impl std::future::Future<Output = io::Result<QuicStream>> + Send + '_ {
        async move {
            let (send, recv) = self.inner.open_bi().await.map_err(connection_error)?;
            Ok(QuicStream::new(send, recv))
        }
    }

    fn accept_stream(&self) -> impl std::future::Future<Output = io::Result<QuicStream>> + Send + '_ {
        async move {
            let (send, recv) = self.inner.accept_bi().await.map_err(connection_error)?;
            Ok(QuicStream::new(send, recv))
        }
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn remote_addr(&self) -> SocketAddr {
        self.inner.remote_address()
    }

    fn close(&self) {
        self.inner.close(VarInt::from_u32(0), b"closed");
    }
}

/// One bidirectional QUIC stream with read/write deadlines.
///
/// Closing finishes the send direction only; data the peer still sends
/// remains readable.
#[derive(Debug)]
pub struct QuicStream {
    send: SendStream,
    recv: RecvStream,
    read_deadline: Deadline,
    write_deadline: Deadline,
}

impl QuicStream {
    fn new(send: SendStream, recv: RecvStream) -> Self {
        Self {
            send,
            recv,
            read_deadline: Deadline::default(),
            write_deadline: Deadline::default(),
        }
    }
}

impl AsyncRead for QuicStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.read_deadline.poll_check(cx)?;
        AsyncRead::poll_read(Pin::new(&mut this.recv), cx, buf)
    }
}

impl AsyncWrite for QuicStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.write_deadline.poll_check(cx)?;
        AsyncWrite::poll_write(Pin::new(&mut this.send), cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.write_deadline.poll_check(cx)?;
        AsyncWrite::poll_flush(Pin::new(&mut this.send), cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(self.get_mut().close())
    }
}

impl MuxStream for QuicStream {
    fn set_read_deadline(&mut self, deadline: Option<Instant>) {
        self.read_deadline.set(deadline);
    }

    fn set_write_deadline(&mut self, deadline: Option<Instant>) {
        self.write_deadline.set(deadline);
    }

    fn close(&mut self) -> io::Result<()> {
        // A stream that is already finished or reset is already closed.
        let _ = self.send.finish();
        Ok(())
    }
}

/// Server endpoint accepting QUIC sessions.
#[derive(Debug)]
pub struct QuicEndpointListener {
    endpoint: Endpoint,
}

impl QuicEndpointListener {
    /// Bind a server endpoint.
    pub fn bind(addr: SocketAddr, config: quinn::ServerConfig) -> Result<Self, EndpointError> {
        let endpoint = Endpoint::server(config, addr).map_err(EndpointError::Bind)?;
        let local_addr = endpoint.local_addr().map_err(EndpointError::Bind)?;

        tracing::info!(address = %local_addr, "QUIC endpoint bound");
        Ok(Self { endpoint })
    }
}

impl MuxListener for QuicEndpointListener {
    type Connection = QuicConnection;

    fn accept(
        &mut self,
    ) -> impl std::future::Future<Output = Option<io::Result<QuicConnection>>> + Send + '_ {
        async move {
            let incoming = self.endpoint.accept().await?;
            let endpoint_addr = match self.endpoint.local_addr() {
                Ok(addr) => addr,
                Err(e) => return Some(Err(e)),
            };
            Some(
                incoming
                    .await
                    .map(|conn| QuicConnection::new(conn, endpoint_addr))
                    .map_err(connection_error),
            )
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.endpoint.local_addr()
    }

    fn close(&self) {
        self.endpoint.close(VarInt::from_u32(0), b"listener closed");
    }
}

/// Client endpoint that turns a server address into a [`StreamSocket`].
#[derive(Debug, Clone)]
pub struct QuicDialer {
    endpoint: Endpoint,
    server_name: String,
}

impl QuicDialer {
    /// Bind a client endpoint on `bind` that dials with `config`.
    pub fn bind(
        bind: SocketAddr,
        config: quinn::ClientConfig,
        server_name: impl Into<String>,
    ) -> Result<Self, EndpointError> {
        let mut endpoint = Endpoint::client(bind).map_err(EndpointError::Bind)?;
        endpoint.set_default_client_config(config);
        Ok(Self {
            endpoint,
            server_name: server_name.into(),
        })
    }

    /// Build a dialer from the `[client]`, `[quic]` sections, bound to the
    /// unspecified address of the server's address family.
    pub fn from_config(config: &AppConfig) -> Result<Self, EndpointError> {
        let server: SocketAddr = config.client.quic_address.parse()?;
        let bind: SocketAddr = if server.is_ipv6() {
            "[::]:0".parse()?
        } else {
            "0.0.0.0:0".parse()?
        };
        Self::bind(bind, client_config(config)?, config.client.server_name.clone())
    }

    /// Establish a session without opening a stream.
    pub async fn connect(&self, addr: SocketAddr) -> Result<QuicConnection, DialError> {
        let conn = self.endpoint.connect(addr, &self.server_name)?.await?;
        let endpoint_addr = self
            .endpoint
            .local_addr()
            .map_err(DialError::Endpoint)?;

        tracing::debug!(
            remote_addr = %conn.remote_address(),
            server_name = %self.server_name,
            "QUIC connection established"
        );
        Ok(QuicConnection::new(conn, endpoint_addr))
    }

    /// Establish a session and open its one stream.
    pub async fn dial(&self, addr: SocketAddr) -> Result<StreamSocket<QuicConnection>, DialError> {
        let conn = self.connect(addr).await?;
        StreamSocket::open(conn).await.map_err(DialError::Stream)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.endpoint.local_addr()
    }

    /// Close every session of this endpoint and wait until the peers have
    /// been notified.
    pub async fn shutdown(&self) {
        self.endpoint.close(VarInt::from_u32(0), b"client done");
        self.endpoint.wait_idle().await;
    }
}

/// Transport parameters shared by both sides.
pub fn transport_config(config: &QuicConfig) -> Result<TransportConfig, EndpointError> {
    let idle = std::time::Duration::from_secs(config.idle_timeout_secs);

    let mut transport = TransportConfig::default();
    transport.max_idle_timeout(Some(IdleTimeout::try_from(idle)?));
    transport.keep_alive_interval(config.keep_alive_secs.map(std::time::Duration::from_secs));
    Ok(transport)
}

/// Server endpoint configuration: certificate material from `[tls]`, ALPN
/// and transport parameters from `[quic]`.
pub fn server_config(config: &AppConfig) -> Result<quinn::ServerConfig, EndpointError> {
    let material = CertificateMaterial::from_config(&config.tls)?;
    let crypto = tls::server_crypto(material, &config.quic.alpn)?;
    let crypto = QuicServerConfig::try_from(crypto).map_err(TlsError::from)?;

    let mut server = quinn::ServerConfig::with_crypto(Arc::new(crypto));
    server.transport_config(Arc::new(transport_config(&config.quic)?));
    Ok(server)
}

/// Client endpoint configuration from `[client]` and `[quic]`.
pub fn client_config(config: &AppConfig) -> Result<quinn::ClientConfig, EndpointError> {
    let verification = if config.client.insecure_skip_verify {
        ServerVerification::Insecure
    } else {
        // Validation guarantees a CA bundle whenever verification is on.
        let path = config.client.ca_cert_path.as_deref().unwrap_or_default();
        ServerVerification::TrustedRoots(tls::load_certs(Path::new(path))?)
    };
    let crypto = tls::client_crypto(&config.quic.alpn, verification)?;
    let crypto = QuicClientConfig::try_from(crypto).map_err(TlsError::from)?;

    let mut client = quinn::ClientConfig::new(Arc::new(crypto));
    client.transport_config(Arc::new(transport_config(&config.quic)?));
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_config_accepts_defaults() {
        assert!(transport_config(&QuicConfig::default()).is_ok());
    }

    #[test]
    fn idle_timeout_out_of_range_is_rejected() {
        let config = QuicConfig {
            idle_timeout_secs: u64::MAX,
            ..QuicConfig::default()
        };
        assert!(matches!(
            transport_config(&config),
            Err(EndpointError::IdleTimeout(_))
        ));
    }

    #[test]
    fn session_errors_keep_their_kind() {
        let err = connection_error(quinn::ConnectionError::TimedOut);
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        let err = connection_error(quinn::ConnectionError::LocallyClosed);
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }

    #[test]
    fn endpoint_failure_is_not_a_stream_failure() {
        let err = DialError::Endpoint(io::Error::from(io::ErrorKind::NotConnected));
        assert!(err.to_string().starts_with("Client endpoint error"));
        assert!(!matches!(err, DialError::Stream(_)));
    }

    #[tokio::test]
    async fn closed_dialer_refuses_to_connect() {
        let config = AppConfig::default();
        let dialer = QuicDialer::bind(
            "127.0.0.1:0".parse().unwrap(),
            client_config(&config).unwrap(),
            "localhost",
        )
        .unwrap();
        dialer.shutdown().await;

        let err = dialer.connect("127.0.0.1:9".parse().unwrap()).await.unwrap_err();
        assert!(matches!(err, DialError::Connect(_)));
    }

    #[tokio::test]
    async fn endpoint_configs_build_from_defaults() {
        let config = AppConfig::default();
        assert!(server_config(&config).is_ok());
        assert!(client_config(&config).is_ok());
    }
}
