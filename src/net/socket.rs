//! Stream-socket adapter.
//!
//! # Responsibilities
//! - Present one (connection, stream) pair as a single byte-stream socket
//! - Route address queries to the connection
//! - Route byte I/O, deadlines and close to the stream
//!
//! # Design Decisions
//! - The stream always comes from the paired connection: the only
//!   constructors open or accept it there
//! - The adapter holds a connection handle but never closes the connection;
//!   closing the socket releases the stream only
//! - Double close is a no-op
//! - Errors pass through untouched; no buffering, retries or logging

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Instant;

use crate::net::transport::{MuxConnection, MuxStream};

/// A multiplexed stream exposed through the generic socket contract.
///
/// Implements [`AsyncRead`] and [`AsyncWrite`], so any byte-stream RPC
/// layer can drive it directly. A read returning `Ok(0)` means the peer
/// finished its side of the stream.
pub struct StreamSocket<C: MuxConnection> {
    conn: C,
    stream: C::Stream,
    closed: bool,
}

impl<C: MuxConnection> std::fmt::Debug for StreamSocket<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSocket")
            .field("local_addr", &self.conn.local_addr())
            .field("peer_addr", &self.conn.remote_addr())
            .field("closed", &self.closed)
            .finish()
    }
}

impl<C: MuxConnection> StreamSocket<C> {
    /// Open a new stream on `conn` and wrap the pair (dialing side).
    pub async fn open(conn: C) -> io::Result<Self> {
        let stream = conn.open_stream().await?;
        Ok(Self::from_parts(conn, stream))
    }

    /// Wait for the peer's next stream on `conn` and wrap the pair
    /// (accepting side).
    pub async fn accept(conn: C) -> io::Result<Self> {
        let stream = conn.accept_stream().await?;
        Ok(Self::from_parts(conn, stream))
    }

    fn from_parts(conn: C, stream: C::Stream) -> Self {
        Self {
            conn,
            stream,
            closed: false,
        }
    }

    /// Local address of the underlying connection.
    pub fn local_addr(&self) -> SocketAddr {
        self.conn.local_addr()
    }

    /// Remote address of the underlying connection.
    pub fn peer_addr(&self) -> SocketAddr {
        self.conn.remote_addr()
    }

    /// Set both read and write deadlines.
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.stream.set_deadline(deadline);
    }

    pub fn set_read_deadline(&mut self, deadline: Option<Instant>) {
        self.stream.set_read_deadline(deadline);
    }

    pub fn set_write_deadline(&mut self, deadline: Option<Instant>) {
        self.stream.set_write_deadline(deadline);
    }

    /// Close the stream. The connection stays open.
    ///
    /// Calling this again, or after the write side was shut down, returns
    /// `Ok(())` without touching the stream.
    pub fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.stream.close()?;
        self.closed = true;
        Ok(())
    }

    /// Whether [`close`](Self::close) or a write shutdown has completed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The paired connection, e.g. to open further streams on it.
    pub fn connection(&self) -> &C {
        &self.conn
    }
}

impl<C: MuxConnection> AsyncRead for StreamSocket<C> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_read(cx, buf)
    }
}

impl<C: MuxConnection> AsyncWrite for StreamSocket<C> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().stream).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.closed {
            return Poll::Ready(Ok(()));
        }
        let result = std::task::ready!(Pin::new(&mut this.stream).poll_shutdown(cx));
        if result.is_ok() {
            this.closed = true;
        }
        Poll::Ready(result)
    }
}
