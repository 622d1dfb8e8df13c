//! Two-phase checkerboard stencil sweep.
//!
//! Cells are colored by the parity of their *global* coordinates, so the
//! checkerboard stays aligned across worker boundaries. The red phase
//! relaxes even-parity cells from `previous` and carries odd-parity cells
//! forward unchanged; the black phase then relaxes odd-parity cells with
//! neighbor reads from `current`, picking up the red values of the same
//! iteration. One halo refresh per iteration feeds both phases.

use crate::data::Tile;
use crate::topology::{Partition, ProcessGrid};

/// Over-relaxation factor tuned to the grid height, the classical optimum
/// for a Poisson problem on an `X`-cell axis.
#[inline]
pub fn relaxation_factor(global_x: usize) -> f64 {
    2.0 / (1.0 + (std::f64::consts::PI / global_x as f64).sin())
}

/// Upper sweep bound after dropping `padding` cells and the boundary row.
fn clamp_high(local: usize, padding: usize) -> usize {
    (local as i64 - padding as i64 - 1).max(0) as usize
}

/// Inclusive tile-index bounds one worker's sweep covers.
///
/// The full interior is `(1..=localRows, 1..=localCols)`. Workers owning a
/// true domain edge shrink the range: the fixed boundary cells are
/// excluded on the low side, and on the high side the clip also drops the
/// padding cells beyond the true extent. A range can clip to empty on
/// workers whose block is pure padding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SweepRange {
    /// First swept tile row.
    pub i_min: usize,
    /// Last swept tile row (inclusive; may be below `i_min`).
    pub i_max: usize,
    /// First swept tile column.
    pub j_min: usize,
    /// Last swept tile column (inclusive; may be below `j_min`).
    pub j_max: usize,
}

impl SweepRange {
    /// The clipped range for one worker's seat in the topology.
    pub fn clipped(part: &Partition, topo: &ProcessGrid) -> Self {
        let (px, py) = topo.dims();
        let (row, col) = topo.coords();
        let mut range = Self {
            i_min: 1,
            i_max: part.local_rows(),
            j_min: 1,
            j_max: part.local_cols(),
        };
        if row == 0 {
            range.i_min = 2;
        }
        if row == px - 1 {
            range.i_max = clamp_high(part.local_rows(), part.padding_rows());
        }
        if col == 0 {
            range.j_min = 2;
        }
        if col == py - 1 {
            range.j_max = clamp_high(part.local_cols(), part.padding_cols());
        }
        range
    }

    /// Number of cells the range covers.
    pub fn cells(&self) -> usize {
        let rows = (self.i_max + 1).saturating_sub(self.i_min);
        let cols = (self.j_max + 1).saturating_sub(self.j_min);
        rows * cols
    }
}

/// Red phase: relax even-parity cells from `prev`, copy odd-parity cells
/// into `cur` unchanged.
///
/// The copy makes `cur` a complete state over the swept range, so the
/// black phase may read any in-range neighbor from `cur`.
pub fn red_sweep(
    prev: &Tile,
    cur: &mut Tile,
    range: &SweepRange,
    origin: (usize, usize),
    omega: f64,
) {
    let (oi, oj) = origin;
    for i in range.i_min..=range.i_max {
        for j in range.j_min..=range.j_max {
            if (oi + i + oj + j) % 2 == 0 {
                let relaxed = prev.get(i, j)
                    + (omega / 4.0)
                        * (prev.get(i - 1, j) + prev.get(i, j - 1) + prev.get(i + 1, j)
                            + prev.get(i, j + 1)
                            - 4.0 * prev.get(i, j));
                cur.set(i, j, relaxed);
            } else {
                cur.set(i, j, prev.get(i, j));
            }
        }
    }
}

/// Black phase: relax odd-parity cells, neighbors from `cur` (fresh red
/// values), center from `prev`.
pub fn black_sweep(
    prev: &Tile,
    cur: &mut Tile,
    range: &SweepRange,
    origin: (usize, usize),
    omega: f64,
) {
    let (oi, oj) = origin;
    for i in range.i_min..=range.i_max {
        for j in range.j_min..=range.j_max {
            if (oi + i + oj + j) % 2 == 1 {
                let relaxed = prev.get(i, j)
                    + (omega / 4.0)
                        * (cur.get(i - 1, j) + cur.get(i, j - 1) + cur.get(i + 1, j)
                            + cur.get(i, j + 1)
                            - 4.0 * prev.get(i, j));
                cur.set(i, j, relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relaxation_factor_matches_grid_height() {
        let omega = relaxation_factor(8);
        let by_hand = 2.0 / (1.0 + (std::f64::consts::PI / 8.0).sin());
        assert_eq!(omega, by_hand);
        assert!(omega > 1.0 && omega < 2.0);
    }

    #[test]
    fn lone_worker_excludes_all_four_boundaries() {
        let part = Partition::new(4, 4, 1, 1);
        let topo = ProcessGrid::new(0, 1, 1, 1).unwrap();
        let range = SweepRange::clipped(&part, &topo);
        assert_eq!(
            range,
            SweepRange {
                i_min: 2,
                i_max: 3,
                j_min: 2,
                j_max: 3
            }
        );
        assert_eq!(range.cells(), 4);
    }

    #[test]
    fn clips_follow_topology_seats_on_a_padded_grid() {
        // 10x7 over 3x2: 4x4 blocks, 2 padding rows, 1 padding column.
        let part = Partition::new(10, 7, 3, 2);
        let range_at = |rank: usize| {
            let topo = ProcessGrid::new(rank, 6, 3, 2).unwrap();
            SweepRange::clipped(&part, &topo)
        };
        // Top-left corner: skips the boundary row/column.
        assert_eq!(
            range_at(0),
            SweepRange {
                i_min: 2,
                i_max: 4,
                j_min: 2,
                j_max: 4
            }
        );
        // Top-right: column clip drops padding and the boundary column.
        assert_eq!(
            range_at(1),
            SweepRange {
                i_min: 2,
                i_max: 4,
                j_min: 1,
                j_max: 2
            }
        );
        // Middle row, left column.
        assert_eq!(
            range_at(2),
            SweepRange {
                i_min: 1,
                i_max: 4,
                j_min: 2,
                j_max: 4
            }
        );
        // Bottom-right: both high clips active.
        assert_eq!(
            range_at(5),
            SweepRange {
                i_min: 1,
                i_max: 1,
                j_min: 1,
                j_max: 2
            }
        );
    }

    #[test]
    fn heavy_padding_can_empty_a_range() {
        assert_eq!(clamp_high(2, 3), 0);
        // 3x8 over 2x1: the bottom worker holds rows 2 and 3, where row 2
        // is the fixed boundary and row 3 is padding.
        let part = Partition::new(3, 8, 2, 1);
        let topo = ProcessGrid::new(1, 2, 2, 1).unwrap();
        let range = SweepRange::clipped(&part, &topo);
        assert_eq!(range.i_max, 0);
        assert_eq!(range.cells(), 0);
        assert_eq!((range.i_min..=range.i_max).count(), 0);
    }

    #[test]
    fn uniform_field_is_a_fixed_point_of_both_phases() {
        let part = Partition::new(4, 4, 1, 1);
        let topo = ProcessGrid::new(0, 1, 1, 1).unwrap();
        let range = SweepRange::clipped(&part, &topo);
        let omega = relaxation_factor(4);
        let mut prev = Tile::for_partition(&part);
        let mut cur = Tile::for_partition(&part);
        for i in 0..6 {
            for j in 0..6 {
                prev.set(i, j, 5.0);
                cur.set(i, j, 5.0);
            }
        }
        red_sweep(&prev, &mut cur, &range, (0, 0), omega);
        black_sweep(&prev, &mut cur, &range, (0, 0), omega);
        for i in range.i_min..=range.i_max {
            for j in range.j_min..=range.j_max {
                assert_eq!(cur.get(i, j), 5.0);
            }
        }
    }

    #[test]
    fn red_then_black_matches_hand_computed_cells() {
        // f(i, j) = i^2 + j^2 has a discrete Laplacian of exactly 4, so
        // every relaxed cell moves by omega with omega = 1.
        let part = Partition::new(4, 4, 1, 1);
        let topo = ProcessGrid::new(0, 1, 1, 1).unwrap();
        let range = SweepRange::clipped(&part, &topo);
        let f = |i: usize, j: usize| (i * i + j * j) as f64;
        let mut prev = Tile::for_partition(&part);
        let mut cur = Tile::for_partition(&part);
        for i in 0..6 {
            for j in 0..6 {
                prev.set(i, j, f(i, j));
            }
        }
        // Seed cur's interior the way the solver does after the scatter.
        for i in 1..=4 {
            for j in 1..=4 {
                cur.set(i, j, f(i, j));
            }
        }
        red_sweep(&prev, &mut cur, &range, (0, 0), 1.0);
        assert_eq!(cur.get(2, 2), 9.0);
        assert_eq!(cur.get(3, 3), 19.0);
        // Odd-parity cells are carried forward by the red phase.
        assert_eq!(cur.get(2, 3), 13.0);
        assert_eq!(cur.get(3, 2), 13.0);

        black_sweep(&prev, &mut cur, &range, (0, 0), 1.0);
        // (2,3) reads red values 9 and 19 plus carried cells 10 and 20.
        assert_eq!(cur.get(2, 3), 14.5);
        assert_eq!(cur.get(3, 2), 14.5);
        // Red cells are untouched by the black phase.
        assert_eq!(cur.get(2, 2), 9.0);
        assert_eq!(cur.get(3, 3), 19.0);
    }

    #[test]
    fn parity_uses_global_coordinates() {
        // Workers whose blocks start an odd number of global rows apart
        // see flipped checkerboards over the same tile indices.
        let part = Partition::new(6, 4, 2, 1);
        let top = ProcessGrid::new(0, 2, 2, 1).unwrap();
        let bottom = ProcessGrid::new(1, 2, 2, 1).unwrap();
        assert_eq!(top.tile_origin(&part), (0, 0));
        assert_eq!(bottom.tile_origin(&part), (3, 0));
        let range = SweepRange {
            i_min: 1,
            i_max: 2,
            j_min: 1,
            j_max: 2,
        };
        let f = |i: usize, j: usize| (i * i + j * j) as f64;
        let mut prev = Tile::for_partition(&part);
        for i in 0..5 {
            for j in 0..6 {
                prev.set(i, j, f(i, j));
            }
        }
        let mut cur_top = Tile::for_partition(&part);
        let mut cur_bottom = Tile::for_partition(&part);
        red_sweep(&prev, &mut cur_top, &range, top.tile_origin(&part), 1.0);
        red_sweep(&prev, &mut cur_bottom, &range, bottom.tile_origin(&part), 1.0);
        // The Laplacian of f is exactly 4, so relaxed cells move by 1.0
        // while carried cells keep f. Tile cell (1, 1) is red at the top
        // seat and black three global rows down.
        assert_eq!(cur_top.get(1, 1), f(1, 1) + 1.0);
        assert_eq!(cur_bottom.get(1, 1), f(1, 1));
        assert_eq!(cur_top.get(1, 2), f(1, 2));
        assert_eq!(cur_bottom.get(1, 2), f(1, 2) + 1.0);
    }
}
