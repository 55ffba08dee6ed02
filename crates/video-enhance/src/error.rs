//! Error handling for frame enhancement operations

use std::io;
use thiserror::Error;

/// Main error type for frame enhancement operations
#[derive(Error, Debug)]
pub enum EnhanceError {
    /// I/O error (LUT file reading, etc.)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// LUT file parsing failed
    #[error("LUT file parsing error: {0}")]
    LutParseError(String),

    /// Invalid LUT shape
    #[error("Invalid LUT shape: {rows}x{cols}, expected 256x3")]
    InvalidLutShape { rows: usize, cols: usize },

    /// Frame buffer does not match the declared geometry
    #[error("Invalid frame buffer: {len} bytes for {width}x{height} BGR, expected {expected}")]
    InvalidFrameBuffer {
        len: usize,
        expected: usize,
        width: u32,
        height: u32,
    },

    /// Image operation failed
    #[error("Image operation failed: {0}")]
    ImageOpError(String),

    /// JPEG encoding failed
    #[error("JPEG encoding failed: {0}")]
    EncodeError(String),
}

impl From<opencv::Error> for EnhanceError {
    fn from(err: opencv::Error) -> Self {
        EnhanceError::ImageOpError(err.to_string())
    }
}

/// Result type for frame enhancement operations
pub type EnhanceResult<T> = std::result::Result<T, EnhanceError>;
