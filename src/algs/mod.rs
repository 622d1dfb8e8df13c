//! Re-export public algorithms.

pub mod communicator;
pub mod convergence;
pub mod distribute;
pub mod halo;
pub mod kernel;

pub use communicator::{CommTag, Communicator, NoComm, ThreadComm, Transfer};
#[cfg(feature = "mpi-support")]
pub use communicator::MpiComm;
pub use convergence::{ConvergencePolicy, locally_converged, max_delta};
pub use distribute::{gather_grid, scatter_grid};
pub use halo::HaloExchange;
pub use kernel::{SweepRange, black_sweep, red_sweep, relaxation_factor};
