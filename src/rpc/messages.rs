//! Wire messages and route names of the file service.

use serde::{Deserialize, Serialize};

/// Route of the unary call.
pub const GET_SIMPLE_RESPONSE_PATH: &str = "/rpc.FileService/GetSimpleResponse";

/// Route of the server-streaming call.
pub const STREAM_FILE_PATH: &str = "/rpc.FileService/StreamFile";

/// Content type of every request and response body.
pub const CONTENT_TYPE: &str = "application/rpc+json";

/// Size of every streamed file chunk except possibly the last.
pub const FILE_CHUNK_SIZE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleRequest {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRequest {
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChunk {
    pub content: Vec<u8>,
}
