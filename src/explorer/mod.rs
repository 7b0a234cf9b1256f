//! Coordinate enumeration
//!
//! `SpiralExplorer` walks the lattice in expanding square rings around an
//! origin and persists its cursor through `Storage`, so a restarted search
//! continues exactly where the last durable cursor left off and never emits
//! a coordinate twice.

mod cursor;
mod errors;
mod spiral;

pub use cursor::{cell_at, ring_len, ExplorerCursor};
pub use errors::{ExplorerError, ExplorerResult};
pub use spiral::SpiralExplorer;
