//! Worker tiles: ghost-augmented local blocks and the sweep buffer pair.
//!
//! Each worker owns a `localRows x localCols` block of the padded global
//! grid, stored with a one-cell ghost frame on all four sides. The frame
//! holds copies of neighbouring workers' edge cells after a halo exchange;
//! on true domain edges it is never read. Two tiles of identical shape form
//! a [`TilePair`], the previous/current double buffer the checkerboard
//! sweep alternates between.

use crate::topology::Partition;

/// A ghost-augmented local block: `(rows + 2) x (cols + 2)` cells in
/// row-major order, where `rows x cols` is the owned interior.
///
/// Interior cells live at `(1..=rows, 1..=cols)`; index 0 and the last
/// index of each axis are the ghost frame.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tile {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Tile {
    /// Zero-filled tile with a `rows x cols` interior.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; (rows + 2) * (cols + 2)],
        }
    }

    /// Tile shaped for one worker's block of `part`.
    #[inline]
    pub fn for_partition(part: &Partition) -> Self {
        Self::new(part.local_rows(), part.local_cols())
    }

    /// Interior row count.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Interior column count.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Cells per stored row, ghost columns included.
    #[inline]
    pub fn stride(&self) -> usize {
        self.cols + 2
    }

    /// Flat index of cell `(i, j)`, ghost frame included.
    #[inline]
    pub fn idx(&self, i: usize, j: usize) -> usize {
        i * self.stride() + j
    }

    /// Flat index of the first interior cell, `(1, 1)`.
    #[inline]
    pub fn interior_origin(&self) -> usize {
        self.idx(1, 1)
    }

    /// Read cell `(i, j)`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[self.idx(i, j)]
    }

    /// Write cell `(i, j)`.
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        let at = self.idx(i, j);
        self.data[at] = value;
    }

    /// The whole buffer, ghost frame included.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Mutable view of the whole buffer.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }
}

/// The previous/current double buffer one worker sweeps between.
///
/// [`swap`](Self::swap) exchanges the two roles without copying; the sweep
/// then reads `previous` and writes `current`, exactly one swap per
/// iteration.
#[derive(Clone, Debug)]
pub struct TilePair {
    tiles: [Tile; 2],
    cur: usize,
}

impl TilePair {
    /// Two zero-filled tiles shaped for `part`.
    pub fn new(part: &Partition) -> Self {
        Self {
            tiles: [Tile::for_partition(part), Tile::for_partition(part)],
            cur: 0,
        }
    }

    /// Exchange the previous/current roles.
    #[inline]
    pub fn swap(&mut self) {
        self.cur ^= 1;
    }

    /// The tile holding last iteration's values.
    #[inline]
    pub fn previous(&self) -> &Tile {
        &self.tiles[self.cur ^ 1]
    }

    /// The tile the running iteration writes into.
    #[inline]
    pub fn current(&self) -> &Tile {
        &self.tiles[self.cur]
    }

    /// Mutable access to the previous tile, for halo updates and the
    /// initial scatter.
    #[inline]
    pub fn previous_mut(&mut self) -> &mut Tile {
        &mut self.tiles[self.cur ^ 1]
    }

    /// Both tiles at once, previous read-only and current writable, as the
    /// sweep needs them.
    pub fn previous_and_current_mut(&mut self) -> (&Tile, &mut Tile) {
        let (prev, cur) = self.split_mut();
        (&*prev, cur)
    }

    fn split_mut(&mut self) -> (&mut Tile, &mut Tile) {
        let (lo, hi) = self.tiles.split_at_mut(1);
        if self.cur == 0 {
            (&mut hi[0], &mut lo[0])
        } else {
            (&mut lo[0], &mut hi[0])
        }
    }

    /// Copy the interior of the previous tile into the current one.
    ///
    /// Run once after the scatter seeds `previous`: cells the clipped sweep
    /// range never touches (true domain boundaries, padding) must still
    /// carry their scattered values in `current`, because the gather reads
    /// `current`.
    pub fn seed_current_from_previous(&mut self) {
        let (rows, cols) = (self.tiles[0].rows(), self.tiles[0].cols());
        let (prev, cur) = self.split_mut();
        for i in 1..=rows {
            let src = prev.idx(i, 1);
            let dst = cur.idx(i, 1);
            cur.as_mut_slice()[dst..dst + cols].copy_from_slice(&prev.as_slice()[src..src + cols]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexing_matches_row_major_layout() {
        let tile = Tile::new(3, 4);
        assert_eq!(tile.stride(), 6);
        assert_eq!(tile.idx(0, 0), 0);
        assert_eq!(tile.idx(1, 1), 7);
        assert_eq!(tile.interior_origin(), 7);
        assert_eq!(tile.idx(4, 5), 29);
        assert_eq!(tile.as_slice().len(), 30);
    }

    #[test]
    fn get_set_roundtrip() {
        let mut tile = Tile::new(2, 2);
        tile.set(1, 2, 42.5);
        assert_eq!(tile.get(1, 2), 42.5);
        assert_eq!(tile.as_slice()[tile.idx(1, 2)], 42.5);
    }

    #[test]
    fn for_partition_uses_interior_dims() {
        let part = Partition::new(10, 7, 3, 2);
        let tile = Tile::for_partition(&part);
        assert_eq!(tile.rows(), part.local_rows());
        assert_eq!(tile.cols(), part.local_cols());
        assert_eq!(
            tile.as_slice().len(),
            (part.local_rows() + 2) * (part.local_cols() + 2)
        );
    }

    #[test]
    fn swap_exchanges_roles() {
        let part = Partition::new(4, 4, 1, 1);
        let mut pair = TilePair::new(&part);
        {
            let (_, cur) = pair.previous_and_current_mut();
            cur.set(2, 2, 7.0);
        }
        assert_eq!(pair.current().get(2, 2), 7.0);
        assert_eq!(pair.previous().get(2, 2), 0.0);
        pair.swap();
        assert_eq!(pair.previous().get(2, 2), 7.0);
        assert_eq!(pair.current().get(2, 2), 0.0);
    }

    #[test]
    fn seeding_copies_interior_only() {
        let part = Partition::new(3, 3, 1, 1);
        let mut pair = TilePair::new(&part);
        let prev = pair.previous_mut();
        for i in 0..5 {
            for j in 0..5 {
                prev.set(i, j, (10 * i + j) as f64);
            }
        }
        pair.seed_current_from_previous();
        let cur = pair.current();
        for i in 1..=3 {
            for j in 1..=3 {
                assert_eq!(cur.get(i, j), (10 * i + j) as f64);
            }
        }
        // Ghost frame of current is untouched.
        for k in 0..5 {
            assert_eq!(cur.get(0, k), 0.0);
            assert_eq!(cur.get(4, k), 0.0);
            assert_eq!(cur.get(k, 0), 0.0);
            assert_eq!(cur.get(k, 4), 0.0);
        }
    }
}
