//! Block decomposition of the global grid across the worker topology.
//!
//! Each axis is split independently: when the global size divides evenly by
//! the topology size every worker gets `global/workers` cells and no padding
//! exists; otherwise every worker gets `global/workers + 1` cells and the
//! padded extent grows to `local * workers`. Padding guarantees that all
//! tiles have identical shape; the padded cells never enter a sweep because
//! the iteration ranges are clipped on the high-edge workers.

/// Tile shape and padded extent for one (global grid, worker grid) pairing.
///
/// # Invariants
///
/// - `padded_x % px == 0` and `padded_y % py == 0`
/// - `padded_x >= global_x`, `padded_y >= global_y`
/// - `padded_x - global_x < px`, `padded_y - global_y < py`
///
/// Construction is infallible; `px * py == worker count` is the contract of
/// the topology step, not of this type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Partition {
    global_x: usize,
    global_y: usize,
    local_rows: usize,
    local_cols: usize,
    padded_x: usize,
    padded_y: usize,
}

impl Partition {
    /// Decompose a `global_x x global_y` grid over a `px x py` worker grid.
    pub fn new(global_x: usize, global_y: usize, px: usize, py: usize) -> Self {
        let (local_rows, padded_x) = split_axis(global_x, px);
        let (local_cols, padded_y) = split_axis(global_y, py);
        Self {
            global_x,
            global_y,
            local_rows,
            local_cols,
            padded_x,
            padded_y,
        }
    }

    /// True (unpadded) global extent, `(rows, cols)`.
    #[inline]
    pub fn global(&self) -> (usize, usize) {
        (self.global_x, self.global_y)
    }

    /// Padded global extent, `(rows, cols)`; each axis divides evenly by the
    /// topology extent on that axis.
    #[inline]
    pub fn padded(&self) -> (usize, usize) {
        (self.padded_x, self.padded_y)
    }

    /// Owned rows per tile (halo excluded).
    #[inline]
    pub fn local_rows(&self) -> usize {
        self.local_rows
    }

    /// Owned columns per tile (halo excluded).
    #[inline]
    pub fn local_cols(&self) -> usize {
        self.local_cols
    }

    /// Padding rows beyond the true extent, all owned by the last block row.
    #[inline]
    pub fn padding_rows(&self) -> usize {
        self.padded_x - self.global_x
    }

    /// Padding columns beyond the true extent, all owned by the last block
    /// column.
    #[inline]
    pub fn padding_cols(&self) -> usize {
        self.padded_y - self.global_y
    }

    /// Row stride of a haloed tile buffer, `local_cols + 2`.
    #[inline]
    pub fn tile_stride(&self) -> usize {
        self.local_cols + 2
    }

    /// Owned cells per tile, `local_rows * local_cols`.
    #[inline]
    pub fn tile_cells(&self) -> usize {
        self.local_rows * self.local_cols
    }
}

/// Split one axis: `(local size, padded extent)`.
fn split_axis(global: usize, workers: usize) -> (usize, usize) {
    debug_assert!(workers > 0, "topology extent must be at least 1");
    if global % workers == 0 {
        (global / workers, global)
    } else {
        let local = global / workers + 1;
        (local, local * workers)
    }
}
