//! Error types for QOA encoding and decoding.

use thiserror::Error;

/// Result type for QOA operations.
pub type Result<T> = std::result::Result<T, QoaError>;

/// Errors that can occur during QOA encoding or decoding.
#[derive(Error, Debug)]
pub enum QoaError {
    /// Stream parameters rejected by the encoder
    #[error("Invalid stream descriptor: {0}")]
    InvalidDescriptor(String),

    /// Structurally invalid data rejected by the decoder
    #[error("Malformed QOA stream: {0}")]
    Malformed(String),

    /// Input buffer is too short for the structure being read
    #[error("Short read: need {needed} bytes, have {available}")]
    ShortRead {
        /// Bytes required to read the structure.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// Caller-provided sample buffer does not match the stream shape
    #[error("Buffer size mismatch: got {actual} samples, expected {expected}")]
    BufferSizeMismatch {
        /// Actual buffer length in samples.
        actual: usize,
        /// Expected buffer length in samples.
        expected: usize,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
