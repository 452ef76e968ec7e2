//! Uniform-grid broadphase.
//!
//! The world box is tiled into square cells; each cell owns a growable
//! bucket of particle IDs. Buckets are allocated once and `clear` only
//! resets their lengths, so steady-state ticks never allocate.
//!
//! Particles may leave the world box. Their AABB then maps to columns or
//! rows outside the grid; those cells are simply skipped, which means
//! out-of-box particles stop generating contacts until they re-enter.

use impulse2d_types::{ParticleId, Vec2};
use rayon::prelude::*;

/// Inclusive cell-coordinate range covered by an AABB.
///
/// Coordinates are signed: an AABB reaching outside the world box yields
/// negative or past-the-edge columns/rows, which [`SpatialHashGrid::bucket_index`]
/// rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    /// Leftmost column.
    pub min_col: i32,
    /// Rightmost column.
    pub max_col: i32,
    /// Topmost row.
    pub min_row: i32,
    /// Bottommost row.
    pub max_row: i32,
}

/// Dense uniform grid of particle-ID buckets.
#[derive(Debug)]
pub struct SpatialHashGrid {
    cell_size: f32,
    num_cols: usize,
    num_rows: usize,
    buckets: Vec<Vec<u32>>,
}

impl SpatialHashGrid {
    /// Create a grid covering a `width` x `height` box with square cells.
    #[must_use]
    pub fn new(cell_size: u32, width: u32, height: u32) -> Self {
        let cell = cell_size.max(1) as f32;
        let num_cols = (width as f32 / cell).floor() as usize + 1;
        let num_rows = (height as f32 / cell).floor() as usize + 1;
        Self {
            cell_size: cell,
            num_cols,
            num_rows,
            buckets: vec![Vec::new(); num_cols * num_rows],
        }
    }

    /// Number of grid columns.
    #[must_use]
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Number of grid rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Reset every bucket's length, keeping allocations.
    ///
    /// Each bucket is reset independently, so the pass fans out on rayon.
    pub fn clear(&mut self) {
        self.buckets.par_iter_mut().for_each(Vec::clear);
    }

    /// Cells covered by the AABB `[position - radius, position + radius]`.
    #[must_use]
    pub fn cell_range(&self, position: Vec2, radius: f32) -> CellRange {
        CellRange {
            min_col: ((position.x - radius) / self.cell_size).floor() as i32,
            max_col: ((position.x + radius) / self.cell_size).floor() as i32,
            min_row: ((position.y - radius) / self.cell_size).floor() as i32,
            max_row: ((position.y + radius) / self.cell_size).floor() as i32,
        }
    }

    /// Flat bucket index for a cell, or `None` outside the grid.
    #[must_use]
    pub fn bucket_index(&self, col: i32, row: i32) -> Option<usize> {
        if col < 0 || row < 0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        (col < self.num_cols && row < self.num_rows).then(|| col + row * self.num_cols)
    }

    /// Append a particle ID to a bucket.
    pub fn insert(&mut self, bucket: usize, id: ParticleId) {
        self.buckets[bucket].push(id.raw());
    }

    /// Bucket contents, or `None` outside the grid.
    #[must_use]
    pub fn bucket(&self, col: i32, row: i32) -> Option<&[u32]> {
        self.bucket_index(col, row)
            .map(|index| self.buckets[index].as_slice())
    }

    /// All buckets, for the pair-enumeration sweep.
    #[must_use]
    pub fn buckets(&self) -> &[Vec<u32>] {
        &self.buckets
    }
}
