// Producer connection: slot handshake, constants, per-step tile and file frames
use bytes::Bytes;
use futures_util::stream::{self, Stream};
use protocol::frame::{read_frame, try_read_frame, write_frame, PrefixWidth, DEFAULT_MAX_FRAME_LEN};
use protocol::packets::{build_slot_index, parse_constants, parse_tile};
use protocol::{SimulationConstants, Slot, Tile, TileRect};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, info};

use crate::ClientError;

pub struct Session<S> {
    stream: S,
    slot: Slot,
    max_frame_len: u64,
    constants: Option<SimulationConstants>,
    rect: Option<TileRect>,
    received: u32,
}

impl Session<TcpStream> {
    /// Connect to the producer and claim `slot`.
    pub async fn connect(addr: impl ToSocketAddrs, slot: Slot) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        info!("Connected to {} as slot {}", stream.peer_addr()?, slot);
        Self::register(stream, slot).await
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Send the slot index over an already-open stream.
    pub async fn register(mut stream: S, slot: Slot) -> Result<Self, ClientError> {
        write_frame(&mut stream, &build_slot_index(slot)).await?;
        Ok(Self {
            stream,
            slot,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            constants: None,
            rect: None,
            received: 0,
        })
    }

    /// Cap on accepted frame sizes.
    pub fn with_max_frame_len(mut self, max: u64) -> Self {
        self.max_frame_len = max;
        self
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn constants(&self) -> Option<SimulationConstants> {
        self.constants
    }

    /// Region of the grid this slot receives, known after the handshake.
    pub fn tile_rect(&self) -> Option<TileRect> {
        self.rect
    }

    /// Frames received so far (tiles or files).
    pub fn received(&self) -> u32 {
        self.received
    }

    /// Read the constants message and work out this slot's tile shape.
    pub async fn read_constants(&mut self) -> Result<SimulationConstants, ClientError> {
        let payload = read_frame(&mut self.stream, PrefixWidth::U32, self.max_frame_len).await?;
        let constants = parse_constants(&payload)?;
        let rect = constants
            .tile_rect(self.slot)
            .ok_or(ClientError::SlotOutOfRange(self.slot))?;

        info!(
            "Grid {}x{}, {} timesteps; slot {} receives {}x{} tiles",
            constants.nx, constants.ny, constants.max_timesteps, self.slot, rect.rows, rect.cols
        );
        self.constants = Some(constants);
        self.rect = Some(rect);
        Ok(constants)
    }

    /// Next tile, or `None` once every timestep has arrived.
    pub async fn next_tile(&mut self) -> Result<Option<Tile>, ClientError> {
        let (constants, rect) = match (self.constants, self.rect) {
            (Some(c), Some(r)) => (c, r),
            _ => return Err(ClientError::NoConstants),
        };
        let expected = constants.max_timesteps.max(0) as u32;
        if self.received >= expected {
            return Ok(None);
        }

        let payload = try_read_frame(&mut self.stream, PrefixWidth::U32, self.max_frame_len)
            .await?
            .ok_or(ClientError::EndOfStream {
                received: self.received,
                expected,
            })?;
        let tile = parse_tile(&payload, rect.rows, rect.cols)?;
        self.received += 1;
        debug!("Tile {}/{} received ({} bytes)", self.received, expected, payload.len());
        Ok(Some(tile))
    }

    /// Next file frame of the image-sequence variant, or `None` when the
    /// producer closes the stream between frames.
    pub async fn next_file(&mut self) -> Result<Option<Bytes>, ClientError> {
        let frame = try_read_frame(&mut self.stream, PrefixWidth::U64, self.max_frame_len).await?;
        if let Some(data) = &frame {
            self.received += 1;
            debug!("File {} received ({} bytes)", self.received, data.len());
        }
        Ok(frame)
    }

    /// Turn the session into a stream of tiles. The constants handshake must
    /// already have been read.
    pub fn into_tiles(self) -> impl Stream<Item = Result<Tile, ClientError>> {
        stream::unfold(Some(self), |state| async move {
            let mut session = state?;
            match session.next_tile().await {
                Ok(Some(tile)) => Some((Ok(tile), Some(session))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use protocol::packets::{build_constants, build_file, build_tile};
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_handshake_and_tiles() {
        let (consumer, mut producer) = tokio::io::duplex(1);

        let producer_task = tokio::spawn(async move {
            let mut slot = [0u8; 4];
            producer.read_exact(&mut slot).await.unwrap();
            assert_eq!(slot, [0, 0, 0, 2]);

            let constants = SimulationConstants::new(4, 6, 2);
            write_frame(&mut producer, &build_constants(&constants).finish()).await.unwrap();
            for step in 0..2 {
                let values: Vec<i32> = (0..6).map(|v| v + step * 10).collect();
                write_frame(&mut producer, &build_tile(&values).unwrap().finish())
                    .await
                    .unwrap();
            }
        });

        let mut session = Session::register(consumer, 2).await.unwrap();
        let constants = session.read_constants().await.unwrap();
        assert_eq!(constants, SimulationConstants::new(4, 6, 2));
        assert_eq!(session.tile_rect(), Some(TileRect::new(0, 3, 2, 3)));

        let tiles: Vec<Tile> = session
            .into_tiles()
            .map(|t| t.unwrap())
            .collect()
            .await;
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[1].values, vec![10, 11, 12, 13, 14, 15]);
        assert_eq!((tiles[0].rows, tiles[0].cols), (2, 3));
        producer_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_tiles_need_constants() {
        let (consumer, _producer) = tokio::io::duplex(64);
        let mut session = Session::register(consumer, 1).await.unwrap();
        assert!(matches!(
            session.next_tile().await,
            Err(ClientError::NoConstants)
        ));
    }

    #[tokio::test]
    async fn test_unknown_slot_is_rejected() {
        let (consumer, mut producer) = tokio::io::duplex(64);
        let mut session = Session::register(consumer, 9).await.unwrap();
        let constants = build_constants(&SimulationConstants::new(4, 4, 1)).finish();
        write_frame(&mut producer, &constants).await.unwrap();
        assert!(matches!(
            session.read_constants().await,
            Err(ClientError::SlotOutOfRange(9))
        ));
    }

    #[tokio::test]
    async fn test_early_close_is_reported() {
        let (consumer, mut producer) = tokio::io::duplex(64);
        let mut session = Session::register(consumer, 1).await.unwrap();
        let constants = build_constants(&SimulationConstants::new(2, 2, 3)).finish();
        write_frame(&mut producer, &constants).await.unwrap();
        write_frame(&mut producer, &build_tile(&[7]).unwrap().finish()).await.unwrap();
        drop(producer);

        session.read_constants().await.unwrap();
        assert_eq!(session.next_tile().await.unwrap().unwrap().values, vec![7]);
        assert!(matches!(
            session.next_tile().await,
            Err(ClientError::EndOfStream {
                received: 1,
                expected: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_file_frames_until_close() {
        let (consumer, mut producer) = tokio::io::duplex(8);
        let producer_task = tokio::spawn(async move {
            let mut slot = [0u8; 4];
            producer.read_exact(&mut slot).await.unwrap();
            write_frame(&mut producer, &build_file(b"first").finish()).await.unwrap();
            write_frame(&mut producer, &build_file(b"second").finish()).await.unwrap();
        });

        let mut session = Session::register(consumer, 4).await.unwrap();
        assert_eq!(session.next_file().await.unwrap().as_deref(), Some(&b"first"[..]));
        assert_eq!(session.next_file().await.unwrap().as_deref(), Some(&b"second"[..]));
        producer_task.await.unwrap();
        assert!(session.next_file().await.unwrap().is_none());
        assert_eq!(session.received(), 2);
    }
}
