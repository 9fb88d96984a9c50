// Consumer side of quadcast: connect, claim a slot, decode tiles, hand them on.

use protocol::{ProtocolError, Slot};
use thiserror::Error;

// Module structure - each module handles a specific concern
pub mod network; // Connection, handshake, frame decoding
pub mod persist; // Saving received image frames to disk
pub mod render; // Rendering collaborators for decoded tiles

pub use network::Session;
pub use persist::FrameWriter;
pub use render::{AsciiRenderer, SummarySink, TileSink};

/// Errors seen by a consumer session.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Slot {0} has no quadrant assigned")]
    SlotOutOfRange(Slot),

    #[error("Tiles requested before the constants handshake")]
    NoConstants,

    #[error("Producer closed the stream after {received} of {expected} tiles")]
    EndOfStream { received: u32, expected: u32 },
}
