//! Scatter and gather of worker blocks between the root grid and tiles.
//!
//! The root worker carves its padded [`GlobalGrid`] into `px x py` strided
//! blocks and ships one to every worker (itself included); the gather runs
//! the same transfer in reverse. Block extraction and tile placement reuse
//! the two [`BlockPattern`] shapes the halo layer also builds on, so the
//! strided-region bookkeeping lives in one place.

use crate::algs::communicator::{CommTag, Communicator, Transfer};
use crate::data::{BlockPattern, GlobalGrid, Tile};
use crate::sor_error::SorError;
use crate::topology::{Partition, ProcessGrid};

const TAG_SCATTER: CommTag = CommTag::new(10);
const TAG_GATHER: CommTag = CommTag::new(11);

/// Element offset of `rank`'s block inside the padded global buffer.
///
/// Block row `i`, block column `j` of the topology start at padded-grid
/// cell `(i * localRows, j * localCols)`.
fn block_origin(part: &Partition, topo: &ProcessGrid, rank: usize) -> usize {
    let (_, py) = topo.dims();
    let (_, padded_y) = part.padded();
    let (row, col) = (rank / py, rank % py);
    row * part.local_rows() * padded_y + col * part.local_cols()
}

/// Distribute the root's grid: every worker's tile interior receives its
/// block of the padded domain.
///
/// `global` must be `Some` on the root worker and is ignored elsewhere.
/// Halo cells of `tile` are left untouched.
///
/// # Errors
/// [`SorError::MissingGlobalGrid`] when the root has no grid to hand out,
/// [`SorError::GridShapeMismatch`] when the grid does not fit `part`, plus
/// any transfer failure.
pub fn scatter_grid<C: Communicator>(
    comm: &C,
    part: &Partition,
    topo: &ProcessGrid,
    global: Option<&GlobalGrid>,
    tile: &mut Tile,
) -> Result<(), SorError> {
    let source = BlockPattern::global_block(part);
    let dest = BlockPattern::tile_interior(part);

    let mut packed: Vec<Vec<f64>> = Vec::new();
    if topo.is_root() {
        let global = global.ok_or(SorError::MissingGlobalGrid)?;
        global.check_shape(part)?;
        packed.reserve(topo.size());
        for rank in 0..topo.size() {
            let mut staging = vec![0.0; source.len()];
            source.pack(
                global.as_slice(),
                block_origin(part, topo, rank),
                &mut staging,
            )?;
            packed.push(staging);
        }
    }

    let mut landing = vec![0.0; dest.len()];
    let mut ops: Vec<Transfer<'_>> = Vec::with_capacity(packed.len() + 1);
    for (rank, staging) in packed.iter().enumerate() {
        ops.push(Transfer::Send {
            peer: Some(rank),
            tag: TAG_SCATTER,
            data: staging,
        });
    }
    ops.push(Transfer::Recv {
        peer: Some(0),
        tag: TAG_SCATTER,
        data: &mut landing,
    });
    comm.exchange_all(ops)?;

    let origin = tile.interior_origin();
    dest.unpack(&landing, tile.as_mut_slice(), origin)
}

/// Reassemble the padded domain on the root from every worker's tile
/// interior. Inverse of [`scatter_grid`].
///
/// `global` must be `Some` on the root worker and is ignored elsewhere.
pub fn gather_grid<C: Communicator>(
    comm: &C,
    part: &Partition,
    topo: &ProcessGrid,
    tile: &Tile,
    global: Option<&mut GlobalGrid>,
) -> Result<(), SorError> {
    let source = BlockPattern::tile_interior(part);
    let dest = BlockPattern::global_block(part);

    let root_grid = if topo.is_root() {
        let grid = global.ok_or(SorError::MissingGlobalGrid)?;
        grid.check_shape(part)?;
        Some(grid)
    } else {
        None
    };

    let mut staged = vec![0.0; source.len()];
    source.pack(tile.as_slice(), tile.interior_origin(), &mut staged)?;

    let mut collected: Vec<Vec<f64>> = if topo.is_root() {
        (0..topo.size()).map(|_| vec![0.0; dest.len()]).collect()
    } else {
        Vec::new()
    };
    let mut ops: Vec<Transfer<'_>> = Vec::with_capacity(collected.len() + 1);
    ops.push(Transfer::Send {
        peer: Some(0),
        tag: TAG_GATHER,
        data: &staged,
    });
    for (rank, block) in collected.iter_mut().enumerate() {
        ops.push(Transfer::Recv {
            peer: Some(rank),
            tag: TAG_GATHER,
            data: block,
        });
    }
    comm.exchange_all(ops)?;

    if let Some(grid) = root_grid {
        for (rank, block) in collected.iter().enumerate() {
            dest.unpack(block, grid.as_mut_slice(), block_origin(part, topo, rank))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;

    #[test]
    fn block_origins_tile_the_padded_grid() {
        // 10x7 over 3x2 pads to 12x8 with 4x4 blocks.
        let part = Partition::new(10, 7, 3, 2);
        let topo = ProcessGrid::new(0, 6, 3, 2).unwrap();
        let (_, padded_y) = part.padded();
        for rank in 0..6 {
            let (row, col) = (rank / 2, rank % 2);
            // Same offset the strided scatter parameters of a
            // resized-block layout produce.
            let strided = part.local_rows() * part.local_cols() * 2 * row + part.local_cols() * col;
            assert_eq!(block_origin(&part, &topo, rank), strided);
            assert_eq!(
                block_origin(&part, &topo, rank),
                row * part.local_rows() * padded_y + col * part.local_cols()
            );
        }
    }

    #[test]
    fn single_worker_scatter_fills_tile_interior() {
        let part = Partition::new(4, 5, 1, 1);
        let topo = ProcessGrid::new(0, 1, 1, 1).unwrap();
        let global = GlobalGrid::init_with(&part, |i, j| (10 * i + j) as f64);
        let mut tile = Tile::for_partition(&part);
        scatter_grid(&NoComm, &part, &topo, Some(&global), &mut tile).unwrap();
        for i in 1..=4 {
            for j in 1..=5 {
                assert_eq!(tile.get(i, j), (10 * (i - 1) + (j - 1)) as f64);
            }
        }
        // Ghost frame untouched.
        assert_eq!(tile.get(0, 0), 0.0);
        assert_eq!(tile.get(5, 6), 0.0);
    }

    #[test]
    fn scatter_then_gather_restores_the_grid() {
        let part = Partition::new(6, 6, 1, 1);
        let topo = ProcessGrid::new(0, 1, 1, 1).unwrap();
        let original = GlobalGrid::init_with(&part, |i, j| (i * j) as f64 + 0.25);
        let mut tile = Tile::for_partition(&part);
        scatter_grid(&NoComm, &part, &topo, Some(&original), &mut tile).unwrap();
        let mut back = GlobalGrid::new(&part);
        gather_grid(&NoComm, &part, &topo, &tile, Some(&mut back)).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn root_without_grid_is_an_error() {
        let part = Partition::new(4, 4, 1, 1);
        let topo = ProcessGrid::new(0, 1, 1, 1).unwrap();
        let mut tile = Tile::for_partition(&part);
        assert!(matches!(
            scatter_grid(&NoComm, &part, &topo, None, &mut tile),
            Err(SorError::MissingGlobalGrid)
        ));
        assert!(matches!(
            gather_grid(&NoComm, &part, &topo, &tile, None),
            Err(SorError::MissingGlobalGrid)
        ));
    }

    #[test]
    fn mismatched_grid_shape_is_rejected() {
        let part = Partition::new(4, 4, 1, 1);
        let other = Partition::new(8, 8, 1, 1);
        let topo = ProcessGrid::new(0, 1, 1, 1).unwrap();
        let global = GlobalGrid::new(&other);
        let mut tile = Tile::for_partition(&part);
        assert!(matches!(
            scatter_grid(&NoComm, &part, &topo, Some(&global), &mut tile),
            Err(SorError::GridShapeMismatch { .. })
        ));
    }
}
