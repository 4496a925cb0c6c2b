//! Listener adapter.
//!
//! # Responsibilities
//! - Turn an "accept a connection" source into an "accept a socket" source
//! - Pair every accepted connection with the first stream its peer opens
//! - Optionally bound the wait for that first stream
//! - Plug into `axum::serve` as a [`Listener`](axum::serve::Listener)
//!
//! # Design Decisions
//! - One accept is two waits (connection, then stream); either failure comes
//!   back as one [`AcceptError`]
//! - A connection whose first stream never arrives is dropped, not retried
//! - Only the axum accept loop retries, because its contract has no error
//!   channel

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::net::socket::StreamSocket;
use crate::net::transport::{MuxConnection, MuxListener};
use crate::resilience::Backoff;

const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum AcceptError {
    /// The wrapped listener is closed.
    #[error("Listener closed")]
    Closed,

    /// Transport or handshake failure while accepting a connection.
    #[error("Failed to accept connection: {0}")]
    Connection(#[source] io::Error),

    /// The connection came up but its first stream could not be accepted.
    #[error("Failed to accept stream: {0}")]
    Stream(#[source] io::Error),

    /// The peer opened no stream within the configured time.
    #[error("No stream opened within {0:?}")]
    StreamTimeout(Duration),
}

/// Accepts connections and hands out one [`StreamSocket`] per connection.
#[derive(Debug)]
pub struct SocketListener<L> {
    inner: L,
    stream_accept_timeout: Option<Duration>,
}

impl<L: MuxListener> SocketListener<L> {
    /// Wrap `inner`. Waiting for a connection's first stream is unbounded.
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            stream_accept_timeout: None,
        }
    }

    /// Bound the wait for each connection's first stream. `None` removes the
    /// bound.
    pub fn with_stream_accept_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stream_accept_timeout = timeout;
        self
    }

    /// Wait for the next connection and its first stream.
    ///
    /// Suspends until the peer has opened a stream; a connection that only
    /// completed its handshake does not resolve this future.
    pub async fn accept(&mut self) -> Result<(StreamSocket<L::Connection>, SocketAddr), AcceptError> {
        let conn = match self.inner.accept().await {
            Some(Ok(conn)) => conn,
            Some(Err(e)) => return Err(AcceptError::Connection(e)),
            None => return Err(AcceptError::Closed),
        };
        let peer = conn.remote_addr();

        let socket = match self.stream_accept_timeout {
            None => StreamSocket::accept(conn).await,
            Some(limit) => tokio::time::timeout(limit, StreamSocket::accept(conn))
                .await
                .map_err(|_| AcceptError::StreamTimeout(limit))?,
        }
        .map_err(AcceptError::Stream)?;

        Ok((socket, peer))
    }

    /// Address the wrapped listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Close the wrapped listener. Pending and later accepts fail with
    /// [`AcceptError::Closed`].
    pub fn close(&self) {
        self.inner.close();
    }
}

impl<L: MuxListener> axum::serve::Listener for SocketListener<L> {
    type Io = StreamSocket<L::Connection>;
    type Addr = SocketAddr;

    fn accept(&mut self) -> impl std::future::Future<Output = (Self::Io, Self::Addr)> + Send {
        async move {
            let mut backoff = Backoff::new(ACCEPT_BACKOFF_BASE, ACCEPT_BACKOFF_MAX);
            loop {
                match SocketListener::accept(self).await {
                    Ok((socket, peer)) => {
                        tracing::debug!(peer_addr = %peer, "Stream accepted");
                        return (socket, peer);
                    }
                    Err(AcceptError::Closed) => {
                        tracing::debug!("Listener closed, waiting for shutdown");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt = backoff.attempt(), "Accept failed");
                    }
                }
                tokio::time::sleep(backoff.next_delay()).await;
            }
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::test_support::MemListener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn accepts_first_stream_of_connection() {
        let (listener, handle) = MemListener::new();
        let mut listener = SocketListener::new(listener);

        let client = handle.connect();
        let mut dialed = StreamSocket::open(client.clone()).await.unwrap();
        dialed.write_all(b"ping").await.unwrap();

        let (mut socket, peer) = listener.accept().await.unwrap();
        assert_eq!(peer, client.local_addr());
        assert_eq!(socket.peer_addr(), peer);

        let mut buf = [0u8; 4];
        socket.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn waits_while_no_stream_is_opened() {
        let (listener, handle) = MemListener::new();
        let mut listener = SocketListener::new(listener);
        let _client = handle.connect();

        let pending = tokio::time::timeout(Duration::from_millis(50), listener.accept()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn stream_timeout_is_reported() {
        let (listener, handle) = MemListener::new();
        let mut listener = SocketListener::new(listener)
            .with_stream_accept_timeout(Some(Duration::from_millis(20)));
        let _client = handle.connect();

        let err = listener.accept().await.unwrap_err();
        assert!(matches!(err, AcceptError::StreamTimeout(d) if d == Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn connection_failure_is_reported() {
        let (listener, handle) = MemListener::new();
        let mut listener = SocketListener::new(listener);
        handle.fail(io::ErrorKind::ConnectionRefused);

        let err = listener.accept().await.unwrap_err();
        assert!(
            matches!(err, AcceptError::Connection(e) if e.kind() == io::ErrorKind::ConnectionRefused)
        );
    }

    #[tokio::test]
    async fn stream_failure_is_reported() {
        let (listener, handle) = MemListener::new();
        let mut listener = SocketListener::new(listener);

        // Dropping the client side closes the stream channel.
        drop(handle.connect());

        let err = listener.accept().await.unwrap_err();
        assert!(matches!(err, AcceptError::Stream(_)));
    }

    #[tokio::test]
    async fn closed_listener_is_reported() {
        let (listener, _handle) = MemListener::new();
        let mut listener = SocketListener::new(listener);
        listener.close();

        assert!(matches!(listener.accept().await, Err(AcceptError::Closed)));
    }

    #[tokio::test]
    async fn serve_loop_skips_failed_accepts() {
        let (listener, handle) = MemListener::new();
        let mut listener = SocketListener::new(listener);
        handle.fail(io::ErrorKind::ConnectionReset);

        let client = handle.connect();
        let _dialed = StreamSocket::open(client).await.unwrap();

        let (_socket, peer) = axum::serve::Listener::accept(&mut listener).await;
        assert_eq!(peer, "127.0.0.1:50000".parse::<SocketAddr>().unwrap());
    }
}
