//! The coordinating worker's full-domain buffer.
//!
//! Only the root worker allocates a [`GlobalGrid`]. It is sized to the
//! padded dimensions so every worker block can be carved out with one
//! [`BlockPattern`](crate::data::BlockPattern); cells beyond the true
//! `global_x x global_y` region are zero padding that the clipped sweep
//! ranges keep out of every result cell.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::sor_error::SorError;
use crate::topology::Partition;

/// Dense row-major `padded_x x padded_y` buffer holding the assembled
/// domain on the root worker.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GlobalGrid {
    global_x: usize,
    global_y: usize,
    padded_x: usize,
    padded_y: usize,
    data: Vec<f64>,
}

impl GlobalGrid {
    /// Zero-filled grid shaped for `part`.
    pub fn new(part: &Partition) -> Self {
        let (padded_x, padded_y) = part.padded();
        let (global_x, global_y) = part.global();
        Self {
            global_x,
            global_y,
            padded_x,
            padded_y,
            data: vec![0.0; padded_x * padded_y],
        }
    }

    /// Grid carrying the standard initial condition: the fixed Dirichlet
    /// value `100.0` on the four edges of the true region, `0.0` in its
    /// interior, `0.0` in the padding.
    pub fn with_default_init(part: &Partition) -> Self {
        let mut grid = Self::new(part);
        for i in 0..grid.global_x {
            for j in 0..grid.global_y {
                let on_edge =
                    i == 0 || j == 0 || i == grid.global_x - 1 || j == grid.global_y - 1;
                if on_edge {
                    grid.set(i, j, 100.0);
                }
            }
        }
        grid
    }

    /// Grid whose true region is filled by `f(i, j)`; padding stays zero.
    pub fn init_with(part: &Partition, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut grid = Self::new(part);
        for i in 0..grid.global_x {
            for j in 0..grid.global_y {
                grid.set(i, j, f(i, j));
            }
        }
        grid
    }

    /// True (unpadded) dimensions.
    #[inline]
    pub fn global(&self) -> (usize, usize) {
        (self.global_x, self.global_y)
    }

    /// Padded dimensions; the allocated shape.
    #[inline]
    pub fn padded(&self) -> (usize, usize) {
        (self.padded_x, self.padded_y)
    }

    /// Flat index of cell `(i, j)` in the padded buffer.
    #[inline]
    pub fn idx(&self, i: usize, j: usize) -> usize {
        i * self.padded_y + j
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

    /// Value at the true-region midpoint `(global_x / 2, global_y / 2)`.
    #[inline]
    pub fn midpoint(&self) -> f64 {
        self.get(self.global_x / 2, self.global_y / 2)
    }

    /// The whole padded buffer.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Mutable view of the whole padded buffer.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Check that this grid matches the shape `part` implies.
    pub fn check_shape(&self, part: &Partition) -> Result<(), SorError> {
        let (need_x, need_y) = part.padded();
        if (self.padded_x, self.padded_y) != (need_x, need_y) {
            return Err(SorError::GridShapeMismatch {
                rows: self.padded_x,
                cols: self.padded_y,
                need_rows: need_x,
                need_cols: need_y,
            });
        }
        Ok(())
    }

    /// Write the true region to `dir` as text, one grid row per line, and
    /// return the file path.
    ///
    /// The file name encodes the run shape:
    /// `res_redblack_{X}x{Y}_{Px}x{Py}`.
    pub fn write_dump(&self, dir: &Path, px: usize, py: usize) -> Result<PathBuf, SorError> {
        let name = format!(
            "res_redblack_{}x{}_{}x{}",
            self.global_x, self.global_y, px, py
        );
        let path = dir.join(name);
        let mut text = String::with_capacity(self.global_x * self.global_y * 12);
        for i in 0..self.global_x {
            let mut sep = "";
            for j in 0..self.global_y {
                let _ = write!(text, "{sep}{:.6}", self.get(i, j));
                sep = " ";
            }
            text.push('\n');
        }
        std::fs::write(&path, text).map_err(|source| SorError::DumpIo {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_init_sets_edges_only() {
        let part = Partition::new(5, 4, 1, 1);
        let grid = GlobalGrid::with_default_init(&part);
        assert_eq!(grid.get(0, 2), 100.0);
        assert_eq!(grid.get(4, 0), 100.0);
        assert_eq!(grid.get(2, 3), 100.0);
        assert_eq!(grid.get(2, 2), 0.0);
        assert_eq!(grid.get(1, 1), 0.0);
    }

    #[test]
    fn padding_stays_zero_after_init() {
        // 10x7 over 3x2 pads to 12x8.
        let part = Partition::new(10, 7, 3, 2);
        let grid = GlobalGrid::with_default_init(&part);
        assert_eq!(grid.padded(), (12, 8));
        for i in 10..12 {
            for j in 0..8 {
                assert_eq!(grid.get(i, j), 0.0);
            }
        }
        for i in 0..12 {
            assert_eq!(grid.get(i, 7), 0.0);
        }
    }

    #[test]
    fn midpoint_uses_integer_division() {
        let part = Partition::new(5, 5, 1, 1);
        let grid = GlobalGrid::init_with(&part, |i, j| (10 * i + j) as f64);
        assert_eq!(grid.midpoint(), 22.0);
    }

    #[test]
    fn shape_check_rejects_foreign_partition() {
        let part = Partition::new(8, 8, 2, 2);
        let grid = GlobalGrid::new(&part);
        assert!(grid.check_shape(&part).is_ok());
        let other = Partition::new(10, 7, 3, 2);
        assert!(matches!(
            grid.check_shape(&other),
            Err(SorError::GridShapeMismatch { .. })
        ));
    }

    #[test]
    fn dump_writes_true_region() {
        let part = Partition::new(3, 2, 1, 1);
        let grid = GlobalGrid::init_with(&part, |i, j| (i + j) as f64);
        let dir = std::env::temp_dir();
        let path = grid.write_dump(&dir, 1, 1).unwrap();
        assert!(path.ends_with("res_redblack_3x2_1x1"));
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "0.000000 1.000000");
        assert_eq!(lines[2], "2.000000 3.000000");
        std::fs::remove_file(&path).unwrap();
    }
}
