//! Block patterns: mapping strided grid regions to contiguous buffers.
//!
//! A [`BlockPattern`] describes a set of equally spaced, equally sized runs
//! of cells inside a flat row-major buffer. It is the single description used
//! for every structured copy in the solver: carving worker blocks out of the
//! global grid, staging halo edges for exchange, and writing gathered blocks
//! back. Packing through a pattern always produces a contiguous staging
//! buffer, which is what the communication layer sends and receives.

use crate::sor_error::SorError;
use crate::topology::Partition;

/// A strided block layout over a flat row-major buffer.
///
/// The pattern covers `count` blocks of `block_len` cells each, where
/// consecutive blocks start `stride` cells apart. Together with an `origin`
/// offset it selects a rectangular (or columnar) region of a grid without
/// owning any data.
///
/// # Invariants
///
/// - `stride >= block_len` whenever `count > 1`, so blocks never overlap.
/// - `len()` is the exact staging size required by [`pack`](Self::pack) and
///   [`unpack`](Self::unpack).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockPattern {
    /// Number of blocks.
    count: usize,
    /// Cells per block.
    block_len: usize,
    /// Distance between the starts of consecutive blocks.
    stride: usize,
}

impl BlockPattern {
    /// Build a pattern from raw `count`/`block_len`/`stride` values.
    pub fn new(count: usize, block_len: usize, stride: usize) -> Self {
        debug_assert!(
            count <= 1 || stride >= block_len,
            "blocks must not overlap: block_len={block_len}, stride={stride}"
        );
        Self {
            count,
            block_len,
            stride,
        }
    }

    /// A single contiguous run of `len` cells.
    #[inline]
    pub fn contiguous(len: usize) -> Self {
        Self::new(1, len, len)
    }

    /// One worker's block inside the padded global grid.
    ///
    /// `local_rows` runs of `local_cols` cells, one padded global row apart.
    pub fn global_block(part: &Partition) -> Self {
        Self::new(part.local_rows(), part.local_cols(), part.padded().1)
    }

    /// The interior of a ghost-augmented tile.
    ///
    /// Same shape as [`global_block`](Self::global_block) but strided by the
    /// tile row length, which includes the two ghost columns.
    pub fn tile_interior(part: &Partition) -> Self {
        Self::new(part.local_rows(), part.local_cols(), part.tile_stride())
    }

    /// A single interior row of a tile, ghost columns excluded.
    #[inline]
    pub fn tile_row(part: &Partition) -> Self {
        Self::contiguous(part.local_cols())
    }

    /// A single interior column of a tile, one cell per row.
    #[inline]
    pub fn tile_column(part: &Partition) -> Self {
        Self::new(part.local_rows(), 1, part.tile_stride())
    }

    /// Number of blocks.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Cells per block.
    #[inline]
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Distance between the starts of consecutive blocks.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Total cells selected by the pattern; the required staging length.
    #[inline]
    pub fn len(&self) -> usize {
        self.count * self.block_len
    }

    /// Whether the pattern selects no cells at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0 || self.block_len == 0
    }

    /// Cells spanned in the underlying buffer, from the first block's start
    /// to the last block's end.
    #[inline]
    pub fn span(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.count - 1) * self.stride + self.block_len
        }
    }

    /// Start offset of each block, relative to `origin`.
    pub fn block_starts(&self, origin: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.count).map(move |k| origin + k * self.stride)
    }

    /// Check that the region starting at `origin` fits inside a buffer of
    /// `len` cells.
    fn check_bounds(&self, origin: usize, len: usize) -> Result<(), SorError> {
        let end = origin
            .checked_add(self.span())
            .ok_or(SorError::PatternOutOfBounds {
                count: self.count,
                block_len: self.block_len,
                stride: self.stride,
                origin,
                len,
            })?;
        if end > len {
            return Err(SorError::PatternOutOfBounds {
                count: self.count,
                block_len: self.block_len,
                stride: self.stride,
                origin,
                len,
            });
        }
        Ok(())
    }

    fn check_staging(&self, found: usize) -> Result<(), SorError> {
        if found != self.len() {
            return Err(SorError::StagingLengthMismatch {
                expected: self.len(),
                found,
            });
        }
        Ok(())
    }

    /// Copy the patterned region of `grid` (starting at `origin`) into the
    /// contiguous `staging` buffer.
    ///
    /// # Errors
    /// Returns `StagingLengthMismatch` if `staging.len() != self.len()`, or
    /// `PatternOutOfBounds` if the region does not fit inside `grid`.
    pub fn pack(&self, grid: &[f64], origin: usize, staging: &mut [f64]) -> Result<(), SorError> {
        self.check_staging(staging.len())?;
        self.check_bounds(origin, grid.len())?;
        for (k, start) in self.block_starts(origin).enumerate() {
            let dst = k * self.block_len;
            staging[dst..dst + self.block_len].copy_from_slice(&grid[start..start + self.block_len]);
        }
        Ok(())
    }

    /// Copy the contiguous `staging` buffer back into the patterned region of
    /// `grid` starting at `origin`. Exact inverse of [`pack`](Self::pack).
    ///
    /// # Errors
    /// Same conditions as [`pack`](Self::pack).
    pub fn unpack(&self, staging: &[f64], grid: &mut [f64], origin: usize) -> Result<(), SorError> {
        self.check_staging(staging.len())?;
        self.check_bounds(origin, grid.len())?;
        for (k, start) in self.block_starts(origin).enumerate() {
            let src = k * self.block_len;
            grid[start..start + self.block_len].copy_from_slice(&staging[src..src + self.block_len]);
        }
        Ok(())
    }
}
