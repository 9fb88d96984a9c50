//! Producer -> Consumer message building and parsing.
//!
//! Builders return a [`BinaryWriter`] holding the complete frame (prefix and
//! payload). Parsers take the payload as returned by
//! [`read_frame`](crate::frame::read_frame).

use super::CONSTANTS_PAYLOAD_LEN;
use crate::{BinaryReader, BinaryWriter, ProtocolError, SimulationConstants, Tile};

/// Build a constants frame: u32 BE length (12) + `NX, NY, MAX_TIMESTEPS` as LE i32.
pub fn build_constants(constants: &SimulationConstants) -> BinaryWriter {
    let mut w = BinaryWriter::with_capacity(4 + CONSTANTS_PAYLOAD_LEN);
    w.put_u32_be(CONSTANTS_PAYLOAD_LEN as u32);
    w.put_i32(constants.nx);
    w.put_i32(constants.ny);
    w.put_i32(constants.max_timesteps);
    w
}

/// Parse a constants payload.
pub fn parse_constants(payload: &[u8]) -> Result<SimulationConstants, ProtocolError> {
    if payload.len() != CONSTANTS_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadSize {
            expected: CONSTANTS_PAYLOAD_LEN,
            actual: payload.len(),
        });
    }
    let mut r = BinaryReader::new(payload.to_vec());
    Ok(SimulationConstants::new(r.get_i32(), r.get_i32(), r.get_i32()))
}

/// Build a tile frame: u32 BE byte length + row-major LE i32 values.
pub fn build_tile(values: &[i32]) -> Result<BinaryWriter, ProtocolError> {
    let byte_len = values.len() * 4;
    let prefix = u32::try_from(byte_len).map_err(|_| ProtocolError::FrameTooLarge {
        len: byte_len as u64,
        max: u32::MAX as u64,
    })?;

    let mut w = BinaryWriter::with_capacity(4 + byte_len);
    w.put_u32_be(prefix);
    w.put_i32_slice(values);
    Ok(w)
}

/// Parse a tile payload of known dimensions.
pub fn parse_tile(payload: &[u8], rows: usize, cols: usize) -> Result<Tile, ProtocolError> {
    let expected = rows * cols * 4;
    if payload.len() != expected {
        return Err(ProtocolError::PayloadSize {
            expected,
            actual: payload.len(),
        });
    }
    let mut r = BinaryReader::new(payload.to_vec());
    let values = r.get_i32_vec(rows * cols);
    Ok(Tile { rows, cols, values })
}

/// Build a file frame: u64 BE byte length + raw file bytes.
pub fn build_file(data: &[u8]) -> BinaryWriter {
    let mut w = BinaryWriter::with_capacity(8 + data.len());
    w.put_u64_be(data.len() as u64);
    w.put_slice(data);
    w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{read_frame, write_frame, PrefixWidth, DEFAULT_MAX_FRAME_LEN};

    #[test]
    fn test_constants_layout() {
        let frame = build_constants(&SimulationConstants::new(4, 4, 2)).finish();
        assert_eq!(
            &frame[..],
            &[0, 0, 0, 12, 4, 0, 0, 0, 4, 0, 0, 0, 2, 0, 0, 0]
        );
        assert_eq!(
            parse_constants(&frame[4..]).unwrap(),
            SimulationConstants::new(4, 4, 2)
        );
    }

    #[test]
    fn test_constants_wrong_size() {
        let err = parse_constants(&[0; 8]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::PayloadSize {
                expected: 12,
                actual: 8
            }
        ));
    }

    #[test]
    fn test_tile_length_prefix() {
        let frame = build_tile(&[1, 2, 3, 4]).unwrap().finish();
        assert_eq!(frame.len(), 4 + 16);
        assert_eq!(&frame[..4], &[0, 0, 0, 16]);
    }

    #[test]
    fn test_tile_shape_mismatch() {
        let frame = build_tile(&[1, 2, 3]).unwrap().finish();
        assert!(matches!(
            parse_tile(&frame[4..], 2, 2),
            Err(ProtocolError::PayloadSize { expected: 16, actual: 12 })
        ));
    }

    #[tokio::test]
    async fn test_tile_survives_byte_at_a_time_stream() {
        let values: Vec<i32> = vec![0, 99, -7, i32::MAX, i32::MIN, 42];
        let frame = build_tile(&values).unwrap().finish();

        let (mut tx, mut rx) = tokio::io::duplex(1);
        let writer = tokio::spawn(async move { write_frame(&mut tx, &frame).await });

        let payload = read_frame(&mut rx, PrefixWidth::U32, DEFAULT_MAX_FRAME_LEN)
            .await
            .unwrap();
        let tile = parse_tile(&payload, 2, 3).unwrap();
        assert_eq!(tile.values, values);
        writer.await.unwrap().unwrap();
    }

    #[test]
    fn test_file_frame() {
        let frame = build_file(b"png").finish();
        assert_eq!(&frame[..], &[0, 0, 0, 0, 0, 0, 0, 3, b'p', b'n', b'g']);
    }
}
