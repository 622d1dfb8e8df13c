//! SorError: unified error type for redblack-sor public APIs.
//!
//! Every fallible operation in the crate reports through this enum. In the
//! SPMD model a failed message-passing step has no meaningful partial
//! result, so callers treat any error crossing the run loop as fatal to the
//! whole computation.

use thiserror::Error;

/// Unified error type for solver operations.
#[derive(Debug, Error)]
pub enum SorError {
    /// The requested process grid does not tile the communicator.
    #[error("process grid {px}x{py} does not match communicator size {size}")]
    TopologyMismatch { px: usize, py: usize, size: usize },
    /// A rank outside `[0, size)` was used to address the topology.
    #[error("rank {rank} out of range for communicator of size {size}")]
    RankOutOfRange { rank: usize, size: usize },
    /// A strided region does not fit inside its backing buffer.
    #[error(
        "block pattern {count}x{block_len} (stride {stride}) at origin {origin} exceeds buffer of {len} elements"
    )]
    PatternOutOfBounds {
        count: usize,
        block_len: usize,
        stride: usize,
        origin: usize,
        len: usize,
    },
    /// A contiguous staging buffer has the wrong length for a pattern.
    #[error("staging buffer holds {found} elements, pattern needs {expected}")]
    StagingLengthMismatch { expected: usize, found: usize },
    /// A message arrived with a payload size other than the posted buffer.
    #[error("peer {peer} tag {tag}: received {found} elements, expected {expected}")]
    MessageSizeMismatch {
        peer: usize,
        tag: u16,
        expected: usize,
        found: usize,
    },
    /// A transfer addressed a rank the communicator does not have.
    #[error("transfer targets rank {peer} but the communicator has {size} ranks")]
    PeerOutOfRange { peer: usize, size: usize },
    /// Single-rank exchange posted a receive with no matching send.
    #[error("no matching send for receive (peer {peer}, tag {tag}) in single-rank exchange")]
    UnmatchedReceive { peer: usize, tag: u16 },
    /// Only the coordinating rank holds the assembled grid; it was absent.
    #[error("the coordinating rank must supply the global grid buffer")]
    MissingGlobalGrid,
    /// The assembled grid does not have the padded shape the partition needs.
    #[error("global grid is {rows}x{cols} but the partition needs {need_rows}x{need_cols}")]
    GridShapeMismatch {
        rows: usize,
        cols: usize,
        need_rows: usize,
        need_cols: usize,
    },
    /// A worker thread terminated abnormally; the run is unrecoverable.
    #[error("worker {rank} panicked")]
    WorkerPanicked { rank: usize },
    /// The MPI library could not be initialized (or was initialized twice).
    #[error("MPI initialization failed")]
    MpiInit,
    /// Writing the reassembled grid to disk failed.
    #[error("failed to write result grid to {}", path.display())]
    DumpIo {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
