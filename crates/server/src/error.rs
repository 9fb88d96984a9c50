//! Producer error types.

use std::path::PathBuf;
use std::time::Duration;

use protocol::{ProtocolError, Slot};
use thiserror::Error;

/// Invalid run dimensions. Raised before any socket is opened.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DimensionError {
    #[error("Grid dimensions must be positive, got {nx}x{ny}")]
    NonPositive { nx: i32, ny: i32 },

    #[error("Unsupported consumer count {0} (expected 1 or 4)")]
    ConsumerCount(u32),

    #[error("Timestep count must not be negative, got {0}")]
    Timesteps(i32),

    #[error("Expected {expected} cells, got {actual}")]
    CellCount { expected: usize, actual: usize },
}

/// A slot index that cannot be admitted during registration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Slot {slot} is out of range (1..={max})")]
    OutOfRange { slot: Slot, max: usize },

    #[error("Slot {0} is already registered")]
    Duplicate(Slot),
}

/// Failure to produce the frame for one slot.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("No tile is assigned to slot {0}")]
    UnknownSlot(Slot),

    #[error("Failed to encode frame: {0}")]
    Encode(#[from] ProtocolError),

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by registration and distribution.
#[derive(Debug, Error)]
pub enum DistributorError {
    #[error(transparent)]
    Dimension(#[from] DimensionError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("Handshake failed: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    #[error("Send to slot {slot} failed: {source}")]
    SendFailure {
        slot: Slot,
        #[source]
        source: std::io::Error,
    },

    #[error("Send to slot {slot} timed out after {after:?}")]
    SendTimeout { slot: Slot, after: Duration },

    #[error("Could not build frame for slot {slot}: {source}")]
    Source {
        slot: Slot,
        #[source]
        source: SourceError,
    },

    #[error("Send task crashed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Every consumer has failed; nothing left to serve")]
    AllConsumersFailed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DistributorError {
    /// Slot this error is scoped to, if any.
    pub fn slot(&self) -> Option<Slot> {
        match self {
            DistributorError::SendFailure { slot, .. }
            | DistributorError::SendTimeout { slot, .. }
            | DistributorError::Source { slot, .. } => Some(*slot),
            _ => None,
        }
    }
}
