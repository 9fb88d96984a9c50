//! Static quadrant partition and the tile value type.
//!
//! Rows (`i`) run over `NX`, columns (`j`) over `NY`. The grid is split at the
//! midpoints `NX / 2` and `NY / 2`; the four quadrants cover every cell
//! exactly once, including odd dimensions where the lower/right halves get the
//! extra row or column.

use crate::Slot;

/// A rectangular region of the grid, in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    /// First row.
    pub row: usize,
    /// First column.
    pub col: usize,
    pub rows: usize,
    pub cols: usize,
}

impl TileRect {
    pub const fn new(row: usize, col: usize, rows: usize, cols: usize) -> Self {
        Self {
            row,
            col,
            rows,
            cols,
        }
    }

    /// Number of cells covered.
    #[inline]
    pub const fn area(&self) -> usize {
        self.rows * self.cols
    }

    /// Encoded payload size in bytes (4 bytes per element).
    #[inline]
    pub const fn byte_len(&self) -> usize {
        self.area() * 4
    }

    #[inline]
    pub fn contains(&self, i: usize, j: usize) -> bool {
        i >= self.row && i < self.row + self.rows && j >= self.col && j < self.col + self.cols
    }
}

/// Quadrant of the grid, numbered by slot index.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    TopLeft = 1,
    TopRight = 2,
    BottomLeft = 3,
    BottomRight = 4,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopLeft,
        Quadrant::TopRight,
        Quadrant::BottomLeft,
        Quadrant::BottomRight,
    ];

    pub fn from_slot(slot: Slot) -> Option<Self> {
        match slot {
            1 => Some(Quadrant::TopLeft),
            2 => Some(Quadrant::TopRight),
            3 => Some(Quadrant::BottomLeft),
            4 => Some(Quadrant::BottomRight),
            _ => None,
        }
    }

    #[inline]
    pub const fn slot(self) -> Slot {
        self as Slot
    }

    /// Directory name used by the image-sequence layout.
    pub const fn dir_name(self) -> &'static str {
        match self {
            Quadrant::TopLeft => "top_left",
            Quadrant::TopRight => "top_right",
            Quadrant::BottomLeft => "bottom_left",
            Quadrant::BottomRight => "bottom_right",
        }
    }

    /// This quadrant's rectangle within an `nx` x `ny` grid.
    pub fn rect(self, nx: usize, ny: usize) -> TileRect {
        let mid_row = nx / 2;
        let mid_col = ny / 2;
        match self {
            Quadrant::TopLeft => TileRect::new(0, 0, mid_row, mid_col),
            Quadrant::TopRight => TileRect::new(0, mid_col, mid_row, ny - mid_col),
            Quadrant::BottomLeft => TileRect::new(mid_row, 0, nx - mid_row, mid_col),
            Quadrant::BottomRight => TileRect::new(mid_row, mid_col, nx - mid_row, ny - mid_col),
        }
    }
}

/// All four quadrants of an `nx` x `ny` grid, in slot order.
pub fn quadrants(nx: usize, ny: usize) -> [TileRect; 4] {
    Quadrant::ALL.map(|q| q.rect(nx, ny))
}

/// A copied-out tile: row-major `i32` values plus dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<i32>,
}

impl Tile {
    /// Wrap row-major values. Returns `None` if the length does not match.
    pub fn new(rows: usize, cols: usize, values: Vec<i32>) -> Option<Self> {
        (values.len() == rows * cols).then_some(Self { rows, cols, values })
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> i32 {
        self.values[row * self.cols + col]
    }

    /// Iterate over rows as slices.
    pub fn rows(&self) -> impl Iterator<Item = &[i32]> {
        // chunks(0) panics, so empty tiles yield nothing
        self.values.chunks(self.cols.max(1)).take(self.rows)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exact_cover(nx: usize, ny: usize) {
        let rects = quadrants(nx, ny);
        let total: usize = rects.iter().map(TileRect::area).sum();
        assert_eq!(total, nx * ny, "area mismatch for {nx}x{ny}");

        for i in 0..nx {
            for j in 0..ny {
                let owners = rects.iter().filter(|r| r.contains(i, j)).count();
                assert_eq!(owners, 1, "cell ({i},{j}) covered {owners} times in {nx}x{ny}");
            }
        }
    }

    #[test]
    fn test_quadrants_cover_grid_exactly_once() {
        for nx in 1..=9 {
            for ny in 1..=9 {
                assert_exact_cover(nx, ny);
            }
        }
        assert_exact_cover(64, 64);
        assert_exact_cover(101, 37);
    }

    #[test]
    fn test_slot_order() {
        let [tl, tr, bl, br] = quadrants(4, 6);
        assert_eq!(tl, TileRect::new(0, 0, 2, 3));
        assert_eq!(tr, TileRect::new(0, 3, 2, 3));
        assert_eq!(bl, TileRect::new(2, 0, 2, 3));
        assert_eq!(br, TileRect::new(2, 3, 2, 3));
    }

    #[test]
    fn test_odd_dimensions_favour_bottom_right() {
        let br = Quadrant::BottomRight.rect(5, 3);
        assert_eq!(br, TileRect::new(2, 1, 3, 2));
        assert_eq!(Quadrant::TopLeft.rect(5, 3), TileRect::new(0, 0, 2, 1));
    }

    #[test]
    fn test_slot_mapping() {
        for q in Quadrant::ALL {
            assert_eq!(Quadrant::from_slot(q.slot()), Some(q));
        }
        assert_eq!(Quadrant::from_slot(0), None);
        assert_eq!(Quadrant::from_slot(5), None);
        assert_eq!(Quadrant::BottomLeft.dir_name(), "bottom_left");
    }

    #[test]
    fn test_tile_rows() {
        let tile = Tile::new(2, 3, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let rows: Vec<&[i32]> = tile.rows().collect();
        assert_eq!(rows, vec![&[1, 2, 3][..], &[4, 5, 6][..]]);
        assert_eq!(tile.get(1, 0), 4);
        assert!(Tile::new(2, 2, vec![1]).is_none());
    }
}
