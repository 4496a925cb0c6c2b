//! RPC subsystem.
//!
//! # Data Flow
//! ```text
//! Client:
//!     FileServiceClient (HTTP/2 over any AsyncRead + AsyncWrite)
//!     → codec.rs (length-prefixed JSON frames)
//!     → StreamSocket (QUIC) or TcpStream
//!
//! Server:
//!     axum::serve over SocketListener (QUIC) or TcpListener
//!     → service.rs (routes, handlers)
//!     → codec.rs
//! ```
//!
//! # Design Decisions
//! - The RPC layer never sees QUIC: it only needs a byte-stream socket
//! - One request message per call; streamed responses are frame sequences
//! - Failures map to HTTP statuses; clients surface them as `RpcError::Status`

pub mod client;
pub mod codec;
pub mod error;
pub mod messages;
pub mod server;
pub mod service;

pub use client::{FileChunkStream, FileServiceClient};
pub use error::RpcError;
pub use messages::{FileChunk, FileRequest, SimpleRequest, SimpleResponse};
pub use server::{RpcServer, ServerError};
pub use service::FileService;
