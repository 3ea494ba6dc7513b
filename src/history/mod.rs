//! Undo checkpoints and named snapshots

pub mod checkpoint;
pub mod snapshot;

pub use checkpoint::*;
pub use snapshot::*;
