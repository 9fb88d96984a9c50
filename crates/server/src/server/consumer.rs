//! Registered consumer state.

use protocol::Slot;

/// A registered consumer connection.
#[derive(Debug)]
pub struct Consumer<C> {
    /// Slot index claimed during the handshake.
    pub slot: Slot,
    /// Remote address (or any label for non-TCP connections).
    pub peer: String,
    /// Write side of the connection.
    pub conn: C,
    /// Frames fully written to this consumer.
    pub frames_sent: u64,
    /// Bytes fully written to this consumer, prefixes included.
    pub bytes_sent: u64,
    /// When registration finished.
    pub registered_at: std::time::Instant,
}

impl<C> Consumer<C> {
    pub fn new(slot: Slot, peer: impl Into<String>, conn: C) -> Self {
        Self {
            slot,
            peer: peer.into(),
            conn,
            frames_sent: 0,
            bytes_sent: 0,
            registered_at: std::time::Instant::now(),
        }
    }

    /// Record one delivered frame.
    pub fn record_sent(&mut self, bytes: usize) {
        self.frames_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    /// Position of this consumer in the slot table.
    #[inline]
    pub fn index(&self) -> usize {
        self.slot as usize - 1
    }
}
