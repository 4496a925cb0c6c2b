//! File service handlers.
//!
//! # Responsibilities
//! - Serve `GetSimpleResponse` (unary greeting)
//! - Serve `StreamFile` (file contents as fixed-size chunks)
//! - Confine file lookups to the configured root
//!
//! # Design Decisions
//! - Plain axum router; the transport underneath is invisible here
//! - Request bodies are bounded by `max_message_bytes` plus one frame header
//! - A missing file is reported before the stream starts

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use serde::de::DeserializeOwned;
use tokio::io::AsyncReadExt;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::rpc::codec::{self, HEADER_LEN};
use crate::rpc::error::RpcError;
use crate::rpc::messages::{
    FileChunk, FileRequest, SimpleRequest, SimpleResponse, CONTENT_TYPE, FILE_CHUNK_SIZE,
    GET_SIMPLE_RESPONSE_PATH, STREAM_FILE_PATH,
};

/// Shared state of the file service.
#[derive(Debug, Clone)]
pub struct FileService {
    root: Arc<PathBuf>,
    max_message_bytes: usize,
}

impl FileService {
    pub fn new(root: impl Into<PathBuf>, max_message_bytes: usize) -> Self {
        Self {
            root: Arc::new(root.into()),
            max_message_bytes,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(&config.file_root, config.max_message_bytes)
    }

    /// Build the router serving both routes.
    pub fn router(self) -> Router {
        Router::new()
            .route(GET_SIMPLE_RESPONSE_PATH, post(get_simple_response))
            .route(STREAM_FILE_PATH, post(stream_file))
            .with_state(self)
            .layer(TraceLayer::new_for_http())
    }

    /// Map a requested file name to a path under the root.
    ///
    /// Only plain relative names are accepted: no absolute paths, no `..`.
    pub fn resolve(&self, file_name: &str) -> Result<PathBuf, RpcError> {
        let relative = Path::new(file_name);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if file_name.is_empty() || !plain {
            return Err(RpcError::InvalidArgument(format!(
                "invalid file name {:?}",
                file_name
            )));
        }
        Ok(self.root.join(relative))
    }

    async fn read_message<T: DeserializeOwned>(&self, body: Body) -> Result<T, RpcError> {
        let bytes = axum::body::to_bytes(body, self.max_message_bytes + HEADER_LEN)
            .await
            .map_err(|e| RpcError::Body(e.to_string()))?;
        Ok(codec::decode_message(&bytes, self.max_message_bytes)?)
    }
}

fn message_response(body: Body) -> Response {
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
}

async fn get_simple_response(
    State(service): State<FileService>,
    body: Body,
) -> Result<Response, RpcError> {
    let request: SimpleRequest = service.read_message(body).await?;
    let reply = SimpleResponse {
        message: format!("Hello {}", request.query),
    };
    Ok(message_response(Body::from(codec::encode(&reply)?)))
}

async fn stream_file(State(service): State<FileService>, body: Body) -> Result<Response, RpcError> {
    let request: FileRequest = service.read_message(body).await?;
    let path = service.resolve(&request.file_name)?;

    let file = tokio::fs::File::open(&path).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => RpcError::NotFound(request.file_name.clone()),
        _ => RpcError::Io(e),
    })?;
    tracing::debug!(file = %path.display(), "Streaming file");

    let chunks = futures_util::stream::try_unfold(file, |mut file| async move {
        let mut chunk = vec![0u8; FILE_CHUNK_SIZE];
        let filled = read_chunk(&mut file, &mut chunk).await?;
        if filled == 0 {
            return Ok(None);
        }
        chunk.truncate(filled);
        let frame: Bytes = codec::encode(&FileChunk { content: chunk }).map_err(io::Error::other)?;
        Ok::<_, io::Error>(Some((frame, file)))
    });

    Ok(message_response(Body::from_stream(chunks)))
}

/// Fill `buf` unless the file ends first. Returns the bytes read.
async fn read_chunk(file: &mut tokio::fs::File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
