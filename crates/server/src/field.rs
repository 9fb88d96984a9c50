//! The field engine: a periodic integer grid advanced by constant-velocity
//! advection plus five-point diffusion.
//!
//! Rows are indexed by `i` in `0..nx` and columns by `j` in `0..ny`; storage is
//! row-major. Every neighbour lookup wraps around both edges.

use protocol::{Tile, TileRect};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::PhysicsConfig;
use crate::error::DimensionError;

/// Upper bound (exclusive) of the initial random values.
pub const INITIAL_VALUE_RANGE: i32 = 100;

/// Coefficients of the update rule, resolved from config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Physics {
    pub dx: f64,
    pub dt: f64,
    pub u0: f64,
    pub v0: f64,
    pub kx: f64,
    pub ky: f64,
}

impl Physics {
    pub fn from_config(config: &PhysicsConfig) -> Self {
        Self {
            dx: config.dx,
            dt: config.dt,
            u0: config.u0,
            v0: config.v0,
            kx: config.kx,
            ky: config.ky,
        }
    }

    /// Pure shift: no diffusion, velocities move exactly `(di, dj)` cells per step.
    pub fn shift_only(di: f64, dj: f64) -> Self {
        Self {
            dx: 1.0,
            dt: 1.0,
            u0: di,
            v0: dj,
            kx: 0.0,
            ky: 0.0,
        }
    }

    /// Backward-traced source index for `index` in an axis of length `len`.
    fn trace_back(index: usize, velocity: f64, dt: f64, dx: f64, len: usize) -> usize {
        let shifted = (index as f64 - velocity * dt / dx).rem_euclid(len as f64);
        // rem_euclid can round up to `len` for tiny negative inputs
        (shifted.floor() as usize) % len
    }
}

/// The simulation grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    nx: usize,
    ny: usize,
    cells: Vec<i32>,
}

impl Field {
    /// Create a field filled with seeded random values in `[0, 100)`.
    pub fn new(nx: i32, ny: i32, seed: u64) -> Result<Self, DimensionError> {
        let (nx, ny) = check_dimensions(nx, ny)?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let cells = (0..nx * ny)
            .map(|_| rng.random_range(0..INITIAL_VALUE_RANGE))
            .collect();
        Ok(Self { nx, ny, cells })
    }

    /// Create a field from explicit row-major values.
    pub fn from_values(nx: i32, ny: i32, cells: Vec<i32>) -> Result<Self, DimensionError> {
        let (nx_u, ny_u) = check_dimensions(nx, ny)?;
        if cells.len() != nx_u * ny_u {
            return Err(DimensionError::CellCount {
                expected: nx_u * ny_u,
                actual: cells.len(),
            });
        }
        Ok(Self {
            nx: nx_u,
            ny: ny_u,
            cells,
        })
    }

    #[inline]
    pub fn nx(&self) -> usize {
        self.nx
    }

    #[inline]
    pub fn ny(&self) -> usize {
        self.ny
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> i32 {
        self.cells[i * self.ny + j]
    }

    /// Row-major cell values.
    pub fn values(&self) -> &[i32] {
        &self.cells
    }

    /// Copy `rect` out of the grid, row-major.
    pub fn tile(&self, rect: TileRect) -> Tile {
        let mut values = Vec::with_capacity(rect.area());
        for i in rect.row..rect.row + rect.rows {
            let start = i * self.ny + rect.col;
            values.extend_from_slice(&self.cells[start..start + rect.cols]);
        }
        Tile {
            rows: rect.rows,
            cols: rect.cols,
            values,
        }
    }

    /// Compute the next state. `self` is left untouched.
    pub fn advance(&self, physics: &Physics) -> Field {
        let (nx, ny) = (self.nx, self.ny);

        // The shift is uniform, so each axis' source index depends on one coordinate only.
        let src_rows: Vec<usize> = (0..nx)
            .map(|i| Physics::trace_back(i, physics.u0, physics.dt, physics.dx, nx))
            .collect();
        let src_cols: Vec<usize> = (0..ny)
            .map(|j| Physics::trace_back(j, physics.v0, physics.dt, physics.dx, ny))
            .collect();

        let dx2 = physics.dx * physics.dx;
        let mut cells = Vec::with_capacity(nx * ny);
        for i in 0..nx {
            let up = (i + nx - 1) % nx;
            let down = (i + 1) % nx;
            for j in 0..ny {
                let left = (j + ny - 1) % ny;
                let right = (j + 1) % ny;

                let advected = self.get(src_rows[i], src_cols[j]);

                let neighbours = self.get(down, j) as i64
                    + self.get(up, j) as i64
                    + self.get(i, right) as i64
                    + self.get(i, left) as i64;
                let laplacian = (neighbours - 4 * self.get(i, j) as i64) as f64 / dx2;
                // One Laplacian feeds both diffusion terms.
                let diffusion = (physics.kx * laplacian + physics.ky * laplacian) * physics.dt;

                cells.push((advected as f64 + diffusion).trunc() as i32);
            }
        }

        Field { nx, ny, cells }
    }

    /// Replace the grid with its next state.
    pub fn step(&mut self, physics: &Physics) {
        *self = self.advance(physics);
    }
}

fn check_dimensions(nx: i32, ny: i32) -> Result<(usize, usize), DimensionError> {
    if nx <= 0 || ny <= 0 {
        return Err(DimensionError::NonPositive { nx, ny });
    }
    Ok((nx as usize, ny as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::tiles::quadrants;

    fn reference_physics() -> Physics {
        Physics::from_config(&PhysicsConfig::default())
    }

    #[test]
    fn test_rejects_non_positive_dimensions() {
        assert_eq!(
            Field::new(0, 4, 42),
            Err(DimensionError::NonPositive { nx: 0, ny: 4 })
        );
        assert!(Field::new(4, -1, 42).is_err());
        assert!(Field::from_values(2, 2, vec![1, 2, 3]).is_err());
    }

    #[test]
    fn test_initial_values_in_range() {
        let field = Field::new(32, 17, 42).unwrap();
        assert_eq!(field.values().len(), 32 * 17);
        assert!(field.values().iter().all(|&v| (0..100).contains(&v)));
    }

    #[test]
    fn test_seed_reproducibility() {
        let physics = reference_physics();
        let mut a = Field::new(16, 12, 7).unwrap();
        let mut b = Field::new(16, 12, 7).unwrap();
        assert_eq!(a, b);
        for _ in 0..10 {
            a.step(&physics);
            b.step(&physics);
            assert_eq!(a, b);
        }
        assert_ne!(Field::new(16, 12, 8).unwrap(), Field::new(16, 12, 7).unwrap());
    }

    #[test]
    fn test_hand_computed_step() {
        // Flat field of 7 with a single 9 at (1, 1).
        let mut cells = vec![7; 16];
        cells[4 + 1] = 9;
        let field = Field::from_values(4, 4, cells).unwrap();

        // dt = 200, dx = 1000: u0 = 10 and v0 = 5 move two rows and one column.
        let next = field.advance(&reference_physics());

        #[rustfmt::skip]
        let expected = vec![
            7, 7, 7, 7,
            7, 6, 7, 7,
            7, 7, 7, 7,
            7, 7, 9, 7,
        ];
        // (1, 1) has a negative Laplacian, so the tiny diffusion term truncates 7 down to 6.
        assert_eq!(next.values(), &expected[..]);
    }

    #[test]
    fn test_default_time_step_ignores_run_length() {
        let mut cells = vec![0; 16];
        cells[0] = 100;
        let field = Field::from_values(4, 4, cells).unwrap();

        let mut config = crate::config::Config::default();
        config.simulation.max_timesteps = 2;
        let next = field.advance(&Physics::from_config(&config.physics));

        let peak = next.values().iter().position(|&v| v == 100);
        assert_eq!(peak, Some(2 * 4 + 1));
    }

    #[test]
    fn test_zero_diffusion_integer_shift_is_permutation() {
        let field = Field::new(9, 6, 42).unwrap();
        let next = field.advance(&Physics::shift_only(2.0, -1.0));

        for i in 0..9 {
            for j in 0..6 {
                let src_i = (i + 9 - 2) % 9;
                let src_j = (j + 1) % 6;
                assert_eq!(next.get(i, j), field.get(src_i, src_j));
            }
        }

        let mut before = field.values().to_vec();
        let mut after = next.values().to_vec();
        before.sort_unstable();
        after.sort_unstable();
        assert_eq!(before, after);
    }

    #[test]
    fn test_large_shift_wraps() {
        let field = Field::from_values(3, 1, vec![10, 20, 30]).unwrap();
        // Seven cells forward on a 3-row axis is one cell forward.
        let next = field.advance(&Physics::shift_only(7.0, 0.0));
        assert_eq!(next.values(), &[30, 10, 20]);
    }

    #[test]
    fn test_tiles_reassemble_grid() {
        let field = Field::new(7, 5, 3).unwrap();
        let mut seen = vec![None; 7 * 5];
        for rect in quadrants(7, 5) {
            let tile = field.tile(rect);
            assert_eq!(tile.values.len(), rect.area());
            for r in 0..rect.rows {
                for c in 0..rect.cols {
                    let idx = (rect.row + r) * 5 + rect.col + c;
                    assert!(seen[idx].is_none());
                    seen[idx] = Some(tile.get(r, c));
                }
            }
        }
        let rebuilt: Vec<i32> = seen.into_iter().map(Option::unwrap).collect();
        assert_eq!(rebuilt, field.values());
    }
}
