//! Consumer -> Producer messages.

use bytes::Bytes;
use tokio::io::AsyncRead;

use super::SLOT_INDEX_LEN;
use crate::frame::read_full;
use crate::{BinaryReader, BinaryWriter, ProtocolError, Slot};

/// Build the 4-byte big-endian slot index a consumer sends on connect.
pub fn build_slot_index(slot: Slot) -> Bytes {
    let mut w = BinaryWriter::with_capacity(SLOT_INDEX_LEN);
    w.put_u32_be(slot);
    w.finish()
}

/// Read a consumer's slot index from the stream.
///
/// Fewer than four bytes before the peer closes is a short frame.
pub async fn read_slot_index<R>(reader: &mut R) -> Result<Slot, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; SLOT_INDEX_LEN];
    read_full(reader, &mut buf).await?;
    Ok(BinaryReader::new(buf.to_vec()).get_u32_be())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_index_bytes() {
        assert_eq!(&build_slot_index(3)[..], &[0, 0, 0, 3]);
    }

    #[tokio::test]
    async fn test_read_slot_index() {
        let data: &[u8] = &[0, 0, 0, 4, 99];
        let mut reader = data;
        assert_eq!(read_slot_index(&mut reader).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_truncated_slot_index() {
        let data: &[u8] = &[0, 0, 1];
        let mut reader = data;
        let err = read_slot_index(&mut reader).await.unwrap_err();
        assert!(err.is_short_frame());
    }
}
