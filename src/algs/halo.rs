//! Per-iteration halo exchange of tile edges between neighboring workers.
//!
//! Before each sweep a worker refreshes the ghost frame of its `previous`
//! tile with the edge cells of its four neighbors. All eight transfers
//! (four sends, four receives) go into a single
//! [`exchange_all`](Communicator::exchange_all) batch, the message-passing
//! shape of posting nonblocking operations and waiting on the whole set.
//! Edges facing a true domain boundary have no peer and are skipped on
//! both sides.

use crate::algs::communicator::{CommTag, Communicator, Transfer};
use crate::data::{BlockPattern, Tile};
use crate::sor_error::SorError;
use crate::topology::{Direction, Partition, ProcessGrid};

/// Tag carried by a message traveling toward `dir`.
///
/// A worker receiving from its southern neighbor matches the northward
/// tag, and so on; the pairing keeps opposite-direction traffic on one
/// shared edge distinct.
#[inline]
pub fn travel_tag(dir: Direction) -> CommTag {
    CommTag::new(match dir {
        Direction::North => 1,
        Direction::South => 2,
        Direction::West => 3,
        Direction::East => 4,
    })
}

fn edge_len(part: &Partition, dir: Direction) -> usize {
    match dir {
        Direction::North | Direction::South => part.local_cols(),
        Direction::West | Direction::East => part.local_rows(),
    }
}

/// Reusable staging buffers for one worker's eight halo transfers,
/// indexed by direction.
#[derive(Debug)]
struct HaloBuffers {
    send: [Vec<f64>; 4],
    recv: [Vec<f64>; 4],
}

impl HaloBuffers {
    fn new(part: &Partition) -> Self {
        Self {
            send: Direction::ALL.map(|dir| vec![0.0; edge_len(part, dir)]),
            recv: Direction::ALL.map(|dir| vec![0.0; edge_len(part, dir)]),
        }
    }
}

/// One worker's halo protocol: peers, staged edge shapes, and buffers.
///
/// Everything is computed once before the iteration loop; an
/// [`exchange`](Self::exchange) allocates nothing.
#[derive(Debug)]
pub struct HaloExchange {
    neighbors: [Option<usize>; 4],
    patterns: [BlockPattern; 4],
    send_origins: [usize; 4],
    recv_origins: [usize; 4],
    buffers: HaloBuffers,
}

impl HaloExchange {
    /// Set up the exchange for one worker's tile shape and topology seat.
    ///
    /// Sends stage the outermost interior row or column facing each
    /// neighbor; receives land in the ghost run just outside it.
    pub fn new(part: &Partition, topo: &ProcessGrid) -> Self {
        let rows = part.local_rows();
        let cols = part.local_cols();
        let stride = part.tile_stride();
        let at = |i: usize, j: usize| i * stride + j;
        let row = BlockPattern::tile_row(part);
        let col = BlockPattern::tile_column(part);
        Self {
            neighbors: Direction::ALL.map(|dir| topo.neighbor(dir)),
            patterns: [row, row, col, col],
            send_origins: [at(1, 1), at(rows, 1), at(1, 1), at(1, cols)],
            recv_origins: [at(0, 1), at(rows + 1, 1), at(1, 0), at(1, cols + 1)],
            buffers: HaloBuffers::new(part),
        }
    }

    /// Refresh the ghost frame of `tile` from the four neighbors.
    ///
    /// Ghost runs on true domain edges keep their previous contents; the
    /// clipped sweep ranges never read them there.
    pub fn exchange<C: Communicator>(
        &mut self,
        comm: &C,
        tile: &mut Tile,
    ) -> Result<(), SorError> {
        for dir in Direction::ALL {
            let k = dir as usize;
            if self.neighbors[k].is_some() {
                self.patterns[k].pack(
                    tile.as_slice(),
                    self.send_origins[k],
                    &mut self.buffers.send[k],
                )?;
            }
        }
        {
            let HaloBuffers { send, recv } = &mut self.buffers;
            let mut ops: Vec<Transfer<'_>> = Vec::with_capacity(8);
            for ((dir, out), inp) in Direction::ALL
                .into_iter()
                .zip(send.iter())
                .zip(recv.iter_mut())
            {
                let peer = self.neighbors[dir as usize];
                ops.push(Transfer::Send {
                    peer,
                    tag: travel_tag(dir),
                    data: out,
                });
                ops.push(Transfer::Recv {
                    peer,
                    tag: travel_tag(dir.opposite()),
                    data: inp,
                });
            }
            comm.exchange_all(ops)?;
        }
        for dir in Direction::ALL {
            let k = dir as usize;
            if self.neighbors[k].is_some() {
                self.patterns[k].unpack(
                    &self.buffers.recv[k],
                    tile.as_mut_slice(),
                    self.recv_origins[k],
                )?;
            }
        }
        Ok(())
    }
}
