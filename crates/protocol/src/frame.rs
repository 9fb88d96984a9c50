//! Length-prefixed frame I/O over async byte streams.
//!
//! A frame is a big-endian length prefix followed by exactly that many payload
//! bytes. Tile and constants frames use a 4-byte prefix, file frames an 8-byte
//! one. Readers keep reading until the whole payload has arrived; the transport
//! is free to hand it over in arbitrarily small pieces.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::ProtocolError;

/// Default upper bound on a single frame payload (64 MiB).
pub const DEFAULT_MAX_FRAME_LEN: u64 = 64 * 1024 * 1024;

/// Width of the big-endian length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixWidth {
    /// `u32` prefix: constants and tile frames.
    U32,
    /// `u64` prefix: image-sequence file frames.
    U64,
}

/// Fill `buf` completely, tolerating partial reads.
///
/// A zero-length read before `buf` is full means the peer closed the stream
/// mid-frame and yields [`ProtocolError::ShortFrame`].
pub async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(ProtocolError::ShortFrame {
                expected: buf.len(),
                received: filled,
            });
        }
        filled += n;
    }
    Ok(())
}

/// Read one frame and return its payload (prefix stripped).
pub async fn read_frame<R>(
    reader: &mut R,
    width: PrefixWidth,
    max_len: u64,
) -> Result<Bytes, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let len = match width {
        PrefixWidth::U32 => {
            let mut prefix = [0u8; 4];
            read_full(reader, &mut prefix).await?;
            u32::from_be_bytes(prefix) as u64
        }
        PrefixWidth::U64 => {
            let mut prefix = [0u8; 8];
            read_full(reader, &mut prefix).await?;
            u64::from_be_bytes(prefix)
        }
    };

    if len > max_len {
        return Err(ProtocolError::FrameTooLarge { len, max: max_len });
    }

    let mut payload = BytesMut::zeroed(len as usize);
    read_full(reader, &mut payload).await?;
    Ok(payload.freeze())
}

/// Like [`read_frame`], but a stream that closes cleanly before the first
/// prefix byte yields `Ok(None)` instead of a short frame.
pub async fn try_read_frame<R>(
    reader: &mut R,
    width: PrefixWidth,
    max_len: u64,
) -> Result<Option<Bytes>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut first = [0u8; 1];
    if reader.read(&mut first).await? == 0 {
        return Ok(None);
    }
    // The consumed byte is the start of this frame's prefix.
    let mut rest = first.as_slice().chain(&mut *reader);
    read_frame(&mut rest, width, max_len).await.map(Some)
}

/// Write an already-encoded frame and flush it.
///
/// The flush completes before this returns, so two frames on one connection
/// never interleave.
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await
}
