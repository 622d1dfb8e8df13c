//! Data module: grid storage and block layouts
#![warn(missing_docs)]

pub mod global;
pub mod pattern;
pub mod tile;

pub use global::GlobalGrid;
pub use pattern::BlockPattern;
pub use tile::{Tile, TilePair};
