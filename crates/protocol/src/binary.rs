//! Binary reading and writing utilities for the quadcast wire format.
//!
//! Length prefixes and the slot handshake are big-endian. Payload integers
//! (constants and tile elements) are little-endian `i32`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// A reader for parsing frame payloads.
#[derive(Debug)]
pub struct BinaryReader {
    buf: Bytes,
}

impl BinaryReader {
    /// Create a new reader from raw bytes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { buf: data.into() }
    }

    /// Big-endian u32 (length prefixes, slot index).
    #[inline]
    pub fn get_u32_be(&mut self) -> u32 {
        self.buf.get_u32()
    }

    #[inline]
    pub fn get_i32(&mut self) -> i32 {
        self.buf.get_i32_le()
    }

    /// Read `count` consecutive little-endian `i32` values.
    pub fn get_i32_vec(&mut self, count: usize) -> Vec<i32> {
        let count = count.min(self.buf.remaining() / 4);
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.buf.get_i32_le());
        }
        values
    }
}

/// A writer for building frames.
#[derive(Debug, Default)]
pub struct BinaryWriter {
    buf: BytesMut,
}

impl BinaryWriter {
    /// Create a new writer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new writer with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Returns the current length.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn put_u32_be(&mut self, v: u32) {
        self.buf.put_u32(v);
    }

    #[inline]
    pub fn put_u64_be(&mut self, v: u64) {
        self.buf.put_u64(v);
    }

    #[inline]
    pub fn put_i32(&mut self, v: i32) {
        self.buf.put_i32_le(v);
    }

    /// Write every value as a little-endian `i32`, in order.
    pub fn put_i32_slice(&mut self, values: &[i32]) {
        self.buf.reserve(values.len() * 4);
        for &v in values {
            self.buf.put_i32_le(v);
        }
    }

    /// Write raw bytes.
    pub fn put_slice(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Consume the writer and return the built buffer.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    /// Get current buffer as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}
