//! File service client over any byte-stream socket.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::client::conn::http2;
use hyper::{header, Method, Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::rpc::codec::{self, FrameDecoder};
use crate::rpc::error::RpcError;
use crate::rpc::messages::{
    FileChunk, FileRequest, SimpleRequest, SimpleResponse, CONTENT_TYPE,
    GET_SIMPLE_RESPONSE_PATH, STREAM_FILE_PATH,
};

/// Default cap on a single response message.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

/// HTTP/2 client for the file service.
///
/// Cloning yields another handle on the same connection.
#[derive(Debug, Clone)]
pub struct FileServiceClient {
    sender: http2::SendRequest<Full<Bytes>>,
    authority: String,
    max_message_bytes: usize,
}

impl FileServiceClient {
    /// Run the HTTP/2 handshake over `io` and spawn the connection driver.
    ///
    /// `authority` only fills the `:authority` pseudo-header.
    pub async fn connect<T>(io: T, authority: impl Into<String>) -> Result<Self, RpcError>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sender, conn) = http2::handshake(TokioExecutor::new(), TokioIo::new(io)).await?;

        // Drive the connection in the background
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "RPC connection closed with error");
            }
        });

        Ok(Self {
            sender,
            authority: authority.into(),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        })
    }

    pub fn with_max_message_bytes(mut self, max_message_bytes: usize) -> Self {
        self.max_message_bytes = max_message_bytes;
        self
    }

    /// Unary call: the server replies `"Hello " + query`.
    pub async fn get_simple_response(
        &mut self,
        query: impl Into<String>,
    ) -> Result<SimpleResponse, RpcError> {
        let request = SimpleRequest {
            query: query.into(),
        };
        let response = self.call(GET_SIMPLE_RESPONSE_PATH, &request).await?;
        let body = response.into_body().collect().await?.to_bytes();
        Ok(codec::decode_message(&body, self.max_message_bytes)?)
    }

    /// Server-streaming call returning the file's chunks as they arrive.
    pub async fn stream_file(
        &mut self,
        file_name: impl Into<String>,
    ) -> Result<FileChunkStream, RpcError> {
        let request = FileRequest {
            file_name: file_name.into(),
        };
        let response = self.call(STREAM_FILE_PATH, &request).await?;
        Ok(FileChunkStream {
            body: response.into_body(),
            decoder: FrameDecoder::new(self.max_message_bytes),
        })
    }

    async fn call<T: Serialize>(&mut self, path: &str, message: &T) -> Result<Response<Incoming>, RpcError> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("http://{}{}", self.authority, path))
            .header(header::CONTENT_TYPE, CONTENT_TYPE)
            .body(Full::new(codec::encode(message)?))?;

        self.sender.ready().await?;
        let response = self.sender.send_request(request).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.into_body().collect().await?.to_bytes();
            return Err(RpcError::Status {
                status,
                message: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(response)
    }
}

/// Incoming chunks of a `StreamFile` call.
#[derive(Debug)]
pub struct FileChunkStream {
    body: Incoming,
    decoder: FrameDecoder,
}

impl FileChunkStream {
    /// The next chunk, or `None` once the server finished the stream.
    pub async fn next(&mut self) -> Result<Option<FileChunk>, RpcError> {
        self.next_message().await
    }

    /// Drain the stream.
    pub async fn collect(mut self) -> Result<Vec<FileChunk>, RpcError> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.next().await? {
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    async fn next_message<T: DeserializeOwned>(&mut self) -> Result<Option<T>, RpcError> {
        loop {
            if let Some(message) = self.decoder.decode()? {
                return Ok(Some(message));
            }
            match self.body.frame().await {
                Some(frame) => {
                    // Trailers carry no messages.
                    if let Ok(data) = frame?.into_data() {
                        self.decoder.extend(&data);
                    }
                }
                None if self.decoder.is_empty() => return Ok(None),
                None => {
                    return Err(codec::CodecError::Truncated {
                        buffered: self.decoder.buffered(),
                    }
                    .into())
                }
            }
        }
    }
}
