//! Periodic convergence detection.
//!
//! Convergence is judged on the swept range only: each worker compares
//! its two buffers cell by cell, and the verdicts are combined with a
//! logical AND across the whole topology. The check runs every
//! `period` iterations because the reduction costs a collective.

use itertools::iproduct;

use crate::algs::kernel::SweepRange;
use crate::data::Tile;

/// When and how strictly to test for a steady state.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConvergencePolicy {
    /// Iterations between checks.
    pub period: usize,
    /// A cell counts as settled when its change is strictly below this.
    pub tolerance: f64,
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self {
            period: 10,
            tolerance: 1e-6,
        }
    }
}

/// Whether every swept cell moved strictly less than `tolerance`
/// between the two buffers. Vacuously true for an empty range.
pub fn locally_converged(prev: &Tile, cur: &Tile, range: &SweepRange, tolerance: f64) -> bool {
    iproduct!(range.i_min..=range.i_max, range.j_min..=range.j_max)
        .all(|(i, j)| (cur.get(i, j) - prev.get(i, j)).abs() < tolerance)
}

/// Largest per-cell change over the swept range, `0.0` when empty.
pub fn max_delta(prev: &Tile, cur: &Tile, range: &SweepRange) -> f64 {
    iproduct!(range.i_min..=range.i_max, range.j_min..=range.j_max)
        .fold(0.0_f64, |acc, (i, j)| {
            acc.max((cur.get(i, j) - prev.get(i, j)).abs())
        })
}
