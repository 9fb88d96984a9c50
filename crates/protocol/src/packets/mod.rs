//! Message definitions for the quadcast protocol.
//!
//! This module contains both consumer->producer (slot handshake) and
//! producer->consumer (constants, tile, file) messages.

mod client;
mod server;

pub use client::*;
pub use server::*;

/// Size of the consumer's slot-index handshake, in bytes.
pub const SLOT_INDEX_LEN: usize = 4;

/// Payload size of a constants message: three `i32` values.
pub const CONSTANTS_PAYLOAD_LEN: usize = 12;
