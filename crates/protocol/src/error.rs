//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while reading or parsing frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Short frame: expected {expected} bytes, stream ended after {received}")]
    ShortFrame { expected: usize, received: usize },

    #[error("Frame length {len} exceeds limit of {max} bytes")]
    FrameTooLarge { len: u64, max: u64 },

    #[error("Payload size mismatch: expected {expected} bytes, got {actual}")]
    PayloadSize { expected: usize, actual: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether the peer went away in the middle of a frame.
    pub fn is_short_frame(&self) -> bool {
        matches!(self, ProtocolError::ShortFrame { .. })
    }
}
