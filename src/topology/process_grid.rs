//! Non-periodic 2D worker grid and neighbor lookup.
//!
//! Workers are laid out row-major over a `px x py` rectangle, matching the
//! rank ordering of a Cartesian communicator with default reordering
//! disabled. A coordinate shift of one step in any axis either lands on a
//! neighboring rank or leaves the rectangle; the latter is represented as
//! `None` rather than a sentinel rank so a send toward a domain edge cannot
//! be addressed by accident.

use crate::sor_error::SorError;
use crate::topology::partition::Partition;

/// One of the four axis-aligned neighbor directions.
///
/// `North`/`South` move along the row axis (axis 0), `West`/`East` along the
/// column axis (axis 1).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
    West,
    East,
}

impl Direction {
    /// All four directions in the exchange order used by the halo protocol.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    /// The direction a message sent this way arrives from on the peer.
    #[inline]
    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
        }
    }
}

/// A worker's placement inside the `px x py` rectangle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessGrid {
    rank: usize,
    size: usize,
    px: usize,
    py: usize,
    row: usize,
    col: usize,
}

impl ProcessGrid {
    /// Place `rank` inside a `px x py` rectangle over `size` workers.
    ///
    /// # Errors
    /// - [`SorError::TopologyMismatch`] unless `px * py == size` with
    ///   `size > 0`,
    /// - [`SorError::RankOutOfRange`] when `rank >= size`.
    pub fn new(rank: usize, size: usize, px: usize, py: usize) -> Result<Self, SorError> {
        if size == 0 || px.checked_mul(py) != Some(size) {
            return Err(SorError::TopologyMismatch { px, py, size });
        }
        if rank >= size {
            return Err(SorError::RankOutOfRange { rank, size });
        }
        Ok(Self {
            rank,
            size,
            px,
            py,
            row: rank / py,
            col: rank % py,
        })
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Topology extent `(px, py)`.
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.px, self.py)
    }

    /// This worker's `(row, col)` coordinates.
    #[inline]
    pub fn coords(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    /// Whether this worker coordinates scatter/gather and reporting.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.rank == 0
    }

    /// Rank sitting at `(row, col)`.
    #[inline]
    pub fn rank_at(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.px && col < self.py);
        row * self.py + col
    }

    /// Neighbor rank one step toward `dir`, or `None` at a domain edge.
    pub fn neighbor(&self, dir: Direction) -> Option<usize> {
        let (row, col) = match dir {
            Direction::North => (self.row.checked_sub(1)?, self.col),
            Direction::South => (self.row + 1, self.col),
            Direction::West => (self.row, self.col.checked_sub(1)?),
            Direction::East => (self.row, self.col + 1),
        };
        (row < self.px && col < self.py).then(|| self.rank_at(row, col))
    }

    /// Global coordinates of this tile's first owned cell, derived from the
    /// worker coordinates and the (uniform) tile shape. Checkerboard parity
    /// must be computed from these offsets, never from local indices alone.
    #[inline]
    pub fn tile_origin(&self, part: &Partition) -> (usize, usize) {
        (self.row * part.local_rows(), self.col * part.local_cols())
    }

    /// Whether this worker owns part of the true-domain boundary on `dir`'s
    /// side, i.e. sits on the corresponding edge of the rectangle.
    #[inline]
    pub fn on_edge(&self, dir: Direction) -> bool {
        self.neighbor(dir).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_grid() {
        assert!(matches!(
            ProcessGrid::new(0, 4, 3, 2),
            Err(SorError::TopologyMismatch { .. })
        ));
        assert!(matches!(
            ProcessGrid::new(0, 0, 0, 0),
            Err(SorError::TopologyMismatch { .. })
        ));
    }

    #[test]
    fn rejects_rank_out_of_range() {
        assert!(matches!(
            ProcessGrid::new(6, 6, 2, 3),
            Err(SorError::RankOutOfRange { .. })
        ));
    }

    #[test]
    fn row_major_coordinates() {
        // 2x3 rectangle: ranks 0..6 laid out row-major.
        for rank in 0..6 {
            let g = ProcessGrid::new(rank, 6, 2, 3).unwrap();
            assert_eq!(g.coords(), (rank / 3, rank % 3));
            assert_eq!(g.rank_at(rank / 3, rank % 3), rank);
        }
    }

    #[test]
    fn interior_worker_has_four_neighbors() {
        let g = ProcessGrid::new(4, 9, 3, 3).unwrap(); // center of 3x3
        assert_eq!(g.neighbor(Direction::North), Some(1));
        assert_eq!(g.neighbor(Direction::South), Some(7));
        assert_eq!(g.neighbor(Direction::West), Some(3));
        assert_eq!(g.neighbor(Direction::East), Some(5));
    }

    #[test]
    fn corners_lose_two_neighbors() {
        let g = ProcessGrid::new(0, 4, 2, 2).unwrap();
        assert_eq!(g.neighbor(Direction::North), None);
        assert_eq!(g.neighbor(Direction::West), None);
        assert_eq!(g.neighbor(Direction::South), Some(2));
        assert_eq!(g.neighbor(Direction::East), Some(1));
        assert!(g.on_edge(Direction::North));
        assert!(!g.on_edge(Direction::South));
    }

    #[test]
    fn single_worker_is_all_edges() {
        let g = ProcessGrid::new(0, 1, 1, 1).unwrap();
        for dir in Direction::ALL {
            assert_eq!(g.neighbor(dir), None);
        }
        assert!(g.is_root());
    }

    #[test]
    fn neighbor_relation_is_symmetric() {
        let size = 12;
        for rank in 0..size {
            let g = ProcessGrid::new(rank, size, 3, 4).unwrap();
            for dir in Direction::ALL {
                if let Some(peer) = g.neighbor(dir) {
                    let pg = ProcessGrid::new(peer, size, 3, 4).unwrap();
                    assert_eq!(pg.neighbor(dir.opposite()), Some(rank));
                }
            }
        }
    }

    #[test]
    fn tile_origin_scales_with_partition() {
        let part = Partition::new(10, 7, 3, 2);
        let g = ProcessGrid::new(5, 6, 3, 2).unwrap(); // (row 2, col 1)
        assert_eq!(g.tile_origin(&part), (2 * 4, 4));
    }
}
