//! Shared protocol crate for quadcast.
//!
//! This crate contains:
//! - Binary reading/writing utilities
//! - Length-prefixed frame I/O over async byte streams
//! - Message builders and parsers (slot handshake, constants, tiles, files)
//! - The static quadrant partition shared by producer and consumer

mod binary;
mod error;
pub mod frame;
pub mod packets;
pub mod tiles;

pub use binary::{BinaryReader, BinaryWriter};
pub use error::ProtocolError;
pub use tiles::{Quadrant, Tile, TileRect};

/// Slot index a consumer claims during the handshake (1-based).
pub type Slot = u32;

/// Run-wide constants sent to every consumer once, right after it registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationConstants {
    /// Grid rows.
    pub nx: i32,
    /// Grid columns.
    pub ny: i32,
    /// Number of timesteps the producer will distribute.
    pub max_timesteps: i32,
}

impl SimulationConstants {
    pub const fn new(nx: i32, ny: i32, max_timesteps: i32) -> Self {
        Self {
            nx,
            ny,
            max_timesteps,
        }
    }

    /// Rectangle of the grid assigned to `slot`, if the slot names a quadrant.
    pub fn tile_rect(&self, slot: Slot) -> Option<TileRect> {
        let quadrant = Quadrant::from_slot(slot)?;
        Some(quadrant.rect(self.nx.max(0) as usize, self.ny.max(0) as usize))
    }
}
