//! RPC over QUIC
//!
//! Runs a stream-oriented RPC stack over QUIC by presenting QUIC streams as
//! ordinary byte-stream sockets.

// Core subsystems
pub mod config;
pub mod net;
pub mod rpc;

// Tools
pub mod bench;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::AppConfig;
pub use lifecycle::Shutdown;
pub use net::{SocketListener, StreamSocket};
pub use rpc::RpcServer;
