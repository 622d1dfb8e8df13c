//! Thin façade over in-process (threaded) or inter-process (MPI) message
//! passing.
//!
//! All point-to-point traffic in the solver moves through one call,
//! [`Communicator::exchange_all`]: the caller hands over a batch of sends
//! and receives and gets control back once every live transfer completed.
//! Batching matches the solver's communication shape (eight halo edges, or
//! one scatter/gather wave) and lets each backend pick its own completion
//! strategy. Payloads are `f64` slices. A transfer addressed to no peer
//! (a true domain edge) completes immediately without touching its buffer,
//! mirroring a null-process destination.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};

use crate::sor_error::SorError;

/// Message tag separating concurrent traffic between the same pair of
/// workers.
///
/// Values at or above `0xFF00` are reserved for the collectives layered on
/// top of the point-to-point mailbox.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct CommTag(u16);

impl CommTag {
    /// Wrap a raw tag value.
    #[inline]
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    /// The raw tag value.
    #[inline]
    pub const fn get(self) -> u16 {
        self.0
    }
}

const TAG_COLLECT: CommTag = CommTag::new(0xFF00);
const TAG_RELEASE: CommTag = CommTag::new(0xFF01);

/// One posted transfer in an [`exchange_all`](Communicator::exchange_all)
/// batch.
#[derive(Debug)]
pub enum Transfer<'a> {
    /// Copy `data` to `peer` under `tag`.
    Send {
        /// Destination rank; `None` marks a true domain edge and skips the
        /// transfer.
        peer: Option<usize>,
        /// Channel tag the receiver matches on.
        tag: CommTag,
        /// Payload; must stay untouched until the batch completes.
        data: &'a [f64],
    },
    /// Fill `data` with the message `peer` sent under `tag`.
    Recv {
        /// Source rank; `None` marks a true domain edge and skips the
        /// transfer.
        peer: Option<usize>,
        /// Channel tag to match against.
        tag: CommTag,
        /// Destination buffer; its length is the expected message size.
        data: &'a mut [f64],
    },
}

/// Message passing between the workers of one solver run.
///
/// The solver is written against this trait only. [`NoComm`] backs
/// single-worker runs and unit tests, [`ThreadComm`] backs the in-process
/// multi-worker launcher, and `MpiComm` (feature `mpi-support`) backs real
/// multi-process runs.
pub trait Communicator {
    /// This worker's rank, in `[0, size)`.
    fn rank(&self) -> usize;

    /// Number of workers in the run.
    fn size(&self) -> usize;

    /// Run a batch of transfers to completion.
    ///
    /// Every live transfer is posted before any completion is awaited, so
    /// a batch may pair sends and receives between the same two workers
    /// without ordering them. When this returns, receive buffers hold
    /// their messages and send buffers are free for reuse.
    fn exchange_all(&self, ops: Vec<Transfer<'_>>) -> Result<(), SorError>;

    /// Block until every worker has entered the barrier.
    fn barrier(&self);

    /// Logical AND of `local` across all workers; every worker gets the
    /// result.
    fn all_land(&self, local: bool) -> bool;

    /// Maximum of `value` across all workers, delivered to `root` only;
    /// every other worker gets `None`.
    fn reduce_max(&self, value: f64, root: usize) -> Option<f64>;
}

/// Single-worker communicator for serial runs and unit tests.
///
/// Sends addressed to rank 0 are matched against receives of the same tag
/// within the same batch, first posted first matched, so the scatter and
/// gather self-transfers work unchanged. Collectives are identities.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn exchange_all(&self, ops: Vec<Transfer<'_>>) -> Result<(), SorError> {
        let mut posted: Vec<(CommTag, &[f64])> = Vec::new();
        let mut pending: Vec<(CommTag, &mut [f64])> = Vec::new();
        for op in ops {
            match op {
                Transfer::Send { peer: None, .. } | Transfer::Recv { peer: None, .. } => {}
                Transfer::Send {
                    peer: Some(peer),
                    tag,
                    data,
                } => {
                    if peer != 0 {
                        return Err(SorError::PeerOutOfRange { peer, size: 1 });
                    }
                    posted.push((tag, data));
                }
                Transfer::Recv {
                    peer: Some(peer),
                    tag,
                    data,
                } => {
                    if peer != 0 {
                        return Err(SorError::PeerOutOfRange { peer, size: 1 });
                    }
                    pending.push((tag, data));
                }
            }
        }
        for (tag, dst) in pending {
            let at = posted
                .iter()
                .position(|(posted_tag, _)| *posted_tag == tag)
                .ok_or(SorError::UnmatchedReceive {
                    peer: 0,
                    tag: tag.get(),
                })?;
            let (_, src) = posted.remove(at);
            if src.len() != dst.len() {
                return Err(SorError::MessageSizeMismatch {
                    peer: 0,
                    tag: tag.get(),
                    expected: dst.len(),
                    found: src.len(),
                });
            }
            dst.copy_from_slice(src);
        }
        Ok(())
    }

    fn barrier(&self) {}

    fn all_land(&self, local: bool) -> bool {
        local
    }

    fn reduce_max(&self, value: f64, root: usize) -> Option<f64> {
        (root == 0).then_some(value)
    }
}

// --- ThreadComm: one in-process worker per thread ---

/// Mailbox key: (universe, source, destination, tag).
type MailKey = (u64, usize, usize, u16);

static MAILBOX: Lazy<DashMap<MailKey, VecDeque<Bytes>>> = Lazy::new(DashMap::new);
static NEXT_UNIVERSE: AtomicU64 = AtomicU64::new(0);

/// State shared by the workers of one [`ThreadComm::universe`].
///
/// The mailbox is a process-wide map; the universe id keeps concurrent
/// universes (parallel tests in one binary) from seeing each other's
/// traffic. Dropping the last handle clears the universe's keys.
#[derive(Debug)]
struct UniverseShared {
    id: u64,
    lock: Mutex<()>,
    arrived: Condvar,
}

impl Drop for UniverseShared {
    fn drop(&mut self) {
        MAILBOX.retain(|key, _| key.0 != self.id);
    }
}

/// Communicator connecting the worker threads of one process.
///
/// Every transfer is copied through the mailbox, FIFO per (source,
/// destination, tag) channel, so message order between a pair of workers
/// follows program order exactly as a rank-to-rank channel would.
#[derive(Clone, Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    shared: Arc<UniverseShared>,
}

impl ThreadComm {
    /// Create the connected communicators of a `size`-worker universe, one
    /// per rank, in rank order.
    pub fn universe(size: usize) -> Vec<ThreadComm> {
        debug_assert!(size > 0, "a universe needs at least one worker");
        let shared = Arc::new(UniverseShared {
            id: NEXT_UNIVERSE.fetch_add(1, Relaxed),
            lock: Mutex::new(()),
            arrived: Condvar::new(),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    fn check_peer(&self, peer: usize) -> Result<(), SorError> {
        if peer >= self.size {
            return Err(SorError::PeerOutOfRange {
                peer,
                size: self.size,
            });
        }
        Ok(())
    }

    /// Deposit a message and wake workers parked on the mailbox.
    fn post(&self, dst: usize, tag: CommTag, data: &[f64]) {
        let key = (self.shared.id, self.rank, dst, tag.get());
        let payload = Bytes::copy_from_slice(bytemuck::cast_slice(data));
        MAILBOX.entry(key).or_default().push_back(payload);
        let _guard = self.shared.lock.lock();
        self.shared.arrived.notify_all();
    }

    /// Take the next message on `(src, self.rank, tag)`, parking between
    /// polls until one arrives.
    fn take(&self, src: usize, tag: CommTag) -> Bytes {
        let key = (self.shared.id, src, self.rank, tag.get());
        loop {
            if let Some(mut queue) = MAILBOX.get_mut(&key) {
                if let Some(payload) = queue.pop_front() {
                    return payload;
                }
            }
            let mut guard = self.shared.lock.lock();
            // Bounded wait: a notify landing between the poll above and
            // the park is recovered on the next period.
            let _ = self
                .shared
                .arrived
                .wait_for(&mut guard, Duration::from_micros(50));
        }
    }

    fn take_values(&self, src: usize, tag: CommTag) -> Vec<f64> {
        // pod_collect_to_vec realigns; Bytes gives no f64 alignment pledge.
        bytemuck::pod_collect_to_vec(&self.take(src, tag))
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn exchange_all(&self, ops: Vec<Transfer<'_>>) -> Result<(), SorError> {
        // Deposit every outgoing message before draining any receive.
        // Posting never blocks, so two workers exchanging edges in the
        // same batch cannot wait on each other's sends.
        let mut pending: Vec<(usize, CommTag, &mut [f64])> = Vec::new();
        for op in ops {
            match op {
                Transfer::Send { peer: None, .. } | Transfer::Recv { peer: None, .. } => {}
                Transfer::Send {
                    peer: Some(peer),
                    tag,
                    data,
                } => {
                    self.check_peer(peer)?;
                    self.post(peer, tag, data);
                }
                Transfer::Recv {
                    peer: Some(peer),
                    tag,
                    data,
                } => {
                    self.check_peer(peer)?;
                    pending.push((peer, tag, data));
                }
            }
        }
        for (peer, tag, dst) in pending {
            let values = self.take_values(peer, tag);
            if values.len() != dst.len() {
                return Err(SorError::MessageSizeMismatch {
                    peer,
                    tag: tag.get(),
                    expected: dst.len(),
                    found: values.len(),
                });
            }
            dst.copy_from_slice(&values);
        }
        Ok(())
    }

    fn barrier(&self) {
        if self.size == 1 {
            return;
        }
        if self.rank == 0 {
            for src in 1..self.size {
                let _ = self.take(src, TAG_COLLECT);
            }
            for dst in 1..self.size {
                self.post(dst, TAG_RELEASE, &[]);
            }
        } else {
            self.post(0, TAG_COLLECT, &[]);
            let _ = self.take(0, TAG_RELEASE);
        }
    }

    fn all_land(&self, local: bool) -> bool {
        if self.size == 1 {
            return local;
        }
        let encode = |flag: bool| if flag { 1.0 } else { 0.0 };
        let decode = |values: Vec<f64>| values.first().is_some_and(|&v| v != 0.0);
        if self.rank == 0 {
            let mut acc = local;
            for src in 1..self.size {
                acc &= decode(self.take_values(src, TAG_COLLECT));
            }
            for dst in 1..self.size {
                self.post(dst, TAG_RELEASE, &[encode(acc)]);
            }
            acc
        } else {
            self.post(0, TAG_COLLECT, &[encode(local)]);
            decode(self.take_values(0, TAG_RELEASE))
        }
    }

    fn reduce_max(&self, value: f64, root: usize) -> Option<f64> {
        if self.size == 1 {
            return (self.rank == root).then_some(value);
        }
        if self.rank == root {
            let mut acc = value;
            for src in 0..self.size {
                if src == root {
                    continue;
                }
                if let Some(&contribution) = self.take_values(src, TAG_COLLECT).first() {
                    acc = acc.max(contribution);
                }
            }
            Some(acc)
        } else {
            self.post(root, TAG_COLLECT, &[value]);
            None
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use mpi::collective::SystemOperation;
    use mpi::request::RequestCollection;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    use super::{CommTag, Transfer};
    use crate::sor_error::SorError;

    /// Communicator backed by the MPI world.
    ///
    /// The caller owns the `mpi::initialize()` universe; this handle only
    /// borrows the world communicator per operation, which keeps it `Copy`
    /// and free of lifetimes.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct MpiComm;

    impl MpiComm {
        /// Handle to the world communicator. MPI must already be
        /// initialized.
        pub fn new() -> Self {
            Self
        }
    }

    fn check_peer(peer: usize, size: usize) -> Result<(), SorError> {
        if peer >= size {
            return Err(SorError::PeerOutOfRange { peer, size });
        }
        Ok(())
    }

    impl super::Communicator for MpiComm {
        fn rank(&self) -> usize {
            SimpleCommunicator::world().rank() as usize
        }

        fn size(&self) -> usize {
            SimpleCommunicator::world().size() as usize
        }

        fn exchange_all(&self, ops: Vec<Transfer<'_>>) -> Result<(), SorError> {
            let world = SimpleCommunicator::world();
            let size = world.size() as usize;
            let mut sends: Vec<(usize, CommTag, &[f64])> = Vec::new();
            let mut recvs: Vec<(usize, CommTag, &mut [f64])> = Vec::new();
            for op in ops {
                match op {
                    Transfer::Send { peer: None, .. } | Transfer::Recv { peer: None, .. } => {}
                    Transfer::Send {
                        peer: Some(peer),
                        tag,
                        data,
                    } => {
                        check_peer(peer, size)?;
                        sends.push((peer, tag, data));
                    }
                    Transfer::Recv {
                        peer: Some(peer),
                        tag,
                        data,
                    } => {
                        check_peer(peer, size)?;
                        recvs.push((peer, tag, data));
                    }
                }
            }
            let live = sends.len() + recvs.len();
            if live == 0 {
                return Ok(());
            }
            mpi::request::multiple_scope(live, |scope, coll: &mut RequestCollection<'_, [f64]>| {
                for (peer, tag, data) in &sends {
                    let req = world
                        .process_at_rank(*peer as i32)
                        .immediate_send_with_tag(scope, *data, i32::from(tag.get()));
                    coll.add(req);
                }
                for (peer, tag, data) in recvs {
                    let req = world
                        .process_at_rank(peer as i32)
                        .immediate_receive_into_with_tag(scope, data, i32::from(tag.get()));
                    coll.add(req);
                }
                let mut statuses = Vec::with_capacity(live);
                coll.wait_all(&mut statuses);
            });
            Ok(())
        }

        fn barrier(&self) {
            SimpleCommunicator::world().barrier();
        }

        fn all_land(&self, local: bool) -> bool {
            let world = SimpleCommunicator::world();
            let mine = i32::from(local);
            let mut all = 0i32;
            world.all_reduce_into(&mine, &mut all, SystemOperation::logical_and());
            all != 0
        }

        fn reduce_max(&self, value: f64, root: usize) -> Option<f64> {
            let world = SimpleCommunicator::world();
            let target = world.process_at_rank(root as i32);
            if world.rank() as usize == root {
                let mut acc = value;
                target.reduce_into_root(&value, &mut acc, SystemOperation::max());
                Some(acc)
            } else {
                target.reduce_into(&value, SystemOperation::max());
                None
            }
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod layout_tests {
    use super::*;
    use static_assertions::assert_eq_size;

    assert_eq_size!(CommTag, u16);
}
