//! Error handling module
//!
//! Error types for RTSP ingestion and decoder supervision.

use thiserror::Error;

/// RTSP camera library error types
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Decoder start failed: {0}")]
    DecoderStartFailed(String),
}

/// Result type for RTSP camera operations
pub type StreamResult<T> = Result<T, StreamError>;
