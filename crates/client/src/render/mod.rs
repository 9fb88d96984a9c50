// Tile rendering - ASCII heat map and logged summaries
use std::io::{self, Write};

use protocol::Tile;
use tracing::info;

/// Characters from low to high scalar value.
const RAMP: &[u8] = b" .:-=+*#%@";

/// Scalar values the renderer maps onto the ramp; anything outside is clamped.
pub const SCALAR_MIN: i32 = 0;
pub const SCALAR_MAX: i32 = 128;

/// Receives every decoded tile in arrival order.
pub trait TileSink {
    fn render(&mut self, step: u32, tile: &Tile) -> io::Result<()>;
}

/// Draws each tile as a block of characters.
pub struct AsciiRenderer<W: Write> {
    out: W,
    min: i32,
    max: i32,
}

impl<W: Write> AsciiRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            min: SCALAR_MIN,
            max: SCALAR_MAX,
        }
    }

    pub fn with_range(mut self, min: i32, max: i32) -> Self {
        self.min = min;
        self.max = max.max(min + 1);
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    #[inline]
    fn glyph(&self, value: i32) -> u8 {
        let span = (self.max - self.min) as i64;
        let offset = (value.clamp(self.min, self.max) - self.min) as i64;
        let last = (RAMP.len() - 1) as i64;
        RAMP[(offset * last / span) as usize]
    }
}

impl<W: Write> TileSink for AsciiRenderer<W> {
    fn render(&mut self, step: u32, tile: &Tile) -> io::Result<()> {
        writeln!(self.out, "step {} ({}x{})", step, tile.rows, tile.cols)?;
        let mut line = Vec::with_capacity(tile.cols + 1);
        for row in tile.rows() {
            line.clear();
            line.extend(row.iter().map(|&v| self.glyph(v)));
            line.push(b'\n');
            self.out.write_all(&line)?;
        }
        self.out.flush()
    }
}

/// Logs min/max/mean of each tile instead of drawing it.
#[derive(Debug, Default)]
pub struct SummarySink {
    pub tiles: u32,
}

impl TileSink for SummarySink {
    fn render(&mut self, step: u32, tile: &Tile) -> io::Result<()> {
        self.tiles += 1;
        if tile.is_empty() {
            info!("step {}: empty tile", step);
            return Ok(());
        }
        let (min, max, sum) = tile
            .values
            .iter()
            .fold((i32::MAX, i32::MIN, 0i64), |(lo, hi, sum), &v| {
                (lo.min(v), hi.max(v), sum + v as i64)
            });
        let mean = sum as f64 / tile.values.len() as f64;
        info!("step {}: min {} max {} mean {:.2}", step, min, max, mean);
        Ok(())
    }
}
