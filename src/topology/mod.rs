//! Process-topology abstractions for the distributed solver.
//!
//! This module answers the two questions every worker asks once at startup:
//! - how big is my tile, and how much padding did the decomposition add
//!   ([`partition::Partition`]),
//! - where am I in the worker grid and who are my neighbors
//!   ([`process_grid::ProcessGrid`]).
//!
//! Both answers are immutable for the lifetime of a run.

pub mod partition;
pub mod process_grid;

pub use partition::Partition;
pub use process_grid::{Direction, ProcessGrid};
