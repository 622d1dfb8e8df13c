#![cfg_attr(docsrs, feature(doc_cfg))]
//! # redblack-sor
//!
//! redblack-sor is a distributed solver for the 2D steady-state heat
//! equation, using red-black successive over-relaxation over a block
//! decomposition of the grid. Each worker sweeps a ghost-augmented tile,
//! exchanges one-cell halos with its four neighbors every iteration, and
//! periodically votes on convergence; the root scatters the initial grid
//! and gathers the result.
//!
//! ## Features
//! - Uniform block partitioning with padding so every worker gets an
//!   identically shaped tile
//! - Checkerboard two-phase sweep with globally aligned cell parity
//! - Pluggable communication backends (serial, in-process threads, MPI)
//!   behind one [`Communicator`](crate::algs::communicator::Communicator)
//!   trait
//! - Periodic all-worker convergence voting with an early exit
//! - Root-side reporting: per-run timings reduced over all workers, the
//!   domain midpoint and an optional grid dump
//!
//! ## Usage
//! Add `redblack-sor` as a dependency in your `Cargo.toml` and enable
//! features as needed:
//!
//! ```toml
//! [dependencies]
//! redblack-sor = "0.4.1"
//! # Optional features:
//! # features = ["mpi-support"]
//! ```
//!
//! Without `mpi-support` the binary runs all workers as threads of one
//! process, which keeps the numerics and the exchange protocol identical
//! while staying testable on a laptop.

// Re-export our major subsystems:
pub mod algs;
pub mod data;
pub mod solver;
pub mod sor_error;
pub mod topology;

pub use sor_error::SorError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{CommTag, Communicator, NoComm, ThreadComm, Transfer};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::convergence::ConvergencePolicy;
    pub use crate::algs::distribute::{gather_grid, scatter_grid};
    pub use crate::algs::halo::HaloExchange;
    pub use crate::algs::kernel::{SweepRange, black_sweep, red_sweep, relaxation_factor};
    pub use crate::data::{BlockPattern, GlobalGrid, Tile, TilePair};
    pub use crate::solver::{RootResult, RunConfig, RunContext, RunReport, run_worker};
    pub use crate::sor_error::SorError;
    pub use crate::topology::{Direction, Partition, ProcessGrid};
}
