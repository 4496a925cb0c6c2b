//! Capability sets consumed from a multiplexed transport.
//!
//! The adapters in [`socket`](super::socket) and [`listener`](super::listener)
//! only ever talk to these traits. [`quic`](super::quic) implements them over
//! quinn; tests implement them in memory.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;

/// One established session of a multiplexed transport.
///
/// Handles are cheap to clone and all refer to the same session. Address
/// queries may be issued from several tasks at once only when the
/// implementation is `Sync`, which the trait requires.
pub trait MuxConnection: Clone + Unpin + Send + Sync + 'static {
    /// The stream type carried by this connection.
    type Stream: MuxStream;

    /// Open a new outbound bidirectional stream.
    fn open_stream(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send + '_;

    /// Wait for the peer to open a bidirectional stream.
    fn accept_stream(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send + '_;

    /// Local address of the session.
    fn local_addr(&self) -> SocketAddr;

    /// Remote address of the session.
    fn remote_addr(&self) -> SocketAddr;

    /// Close the whole session, aborting every stream on it.
    fn close(&self);
}

/// One ordered bidirectional byte channel of a [`MuxConnection`].
pub trait MuxStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {
    /// Set the absolute deadline for reads. `None` clears it.
    fn set_read_deadline(&mut self, deadline: Option<Instant>);

    /// Set the absolute deadline for writes. `None` clears it.
    fn set_write_deadline(&mut self, deadline: Option<Instant>);

    /// Set both deadlines at once.
    fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.set_read_deadline(deadline);
        self.set_write_deadline(deadline);
    }

    /// Close the stream. The owning connection stays open.
    fn close(&mut self) -> io::Result<()>;
}

/// Accepts inbound sessions of a multiplexed transport.
pub trait MuxListener: Send + 'static {
    /// The connection type produced by [`accept`](MuxListener::accept).
    type Connection: MuxConnection;

    /// Wait for the next inbound connection.
    ///
    /// Resolves to `None` once the listener has been closed.
    fn accept(&mut self) -> impl Future<Output = Option<io::Result<Self::Connection>>> + Send + '_;

    /// Address the listener is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Stop accepting. Pending and future accepts resolve to `None`.
    fn close(&self);
}
