//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Server side:
//!     quinn Endpoint
//!     → quic.rs (QuicEndpointListener: accept + handshake)
//!     → listener.rs (SocketListener: wait for the first stream)
//!     → socket.rs (StreamSocket: AsyncRead + AsyncWrite)
//!     → axum::serve (HTTP/2 RPC)
//!
//! Client side:
//!     quic.rs (QuicDialer: connect + open stream)
//!     → socket.rs (StreamSocket)
//!     → rpc client (HTTP/2 handshake)
//! ```
//!
//! # Design Decisions
//! - Adapters depend on the capability traits in transport.rs, not on quinn
//! - One stream per socket; the connection outlives it
//! - Deadlines are enforced per direction with tokio timers
//! - TLS is mandatory for QUIC; certificates are ephemeral unless configured

pub mod deadline;
pub mod listener;
pub mod quic;
pub mod socket;
pub mod tls;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use listener::{AcceptError, SocketListener};
pub use quic::{DialError, EndpointError, QuicConnection, QuicDialer, QuicEndpointListener, QuicStream};
pub use socket::StreamSocket;
pub use tls::{CertificateMaterial, ServerVerification, TlsError};
pub use transport::{MuxConnection, MuxListener, MuxStream};
