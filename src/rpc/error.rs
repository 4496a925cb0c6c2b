//! RPC error type and its HTTP status mapping.

use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::rpc::codec::CodecError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Failed to read request body: {0}")]
    Body(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("Invalid request: {0}")]
    Request(#[from] axum::http::Error),

    /// The server answered with a non-success status.
    #[error("RPC failed with status {status}: {message}")]
    Status { status: StatusCode, message: String },
}

impl RpcError {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            RpcError::InvalidArgument(_) | RpcError::Codec(_) | RpcError::Body(_) => {
                StatusCode::BAD_REQUEST
            }
            RpcError::NotFound(_) => StatusCode::NOT_FOUND,
            RpcError::Status { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "RPC failed");
        } else {
            tracing::debug!(error = %self, status = %status, "RPC rejected");
        }
        (status, self.to_string()).into_response()
    }
}
