//! Workspace aggregate owning all reconciliation state for one operator

pub mod admin;
pub mod core;
pub mod reconcile;
pub mod selection;
pub mod state;

pub use self::core::*;
pub use reconcile::*;
pub use selection::*;
pub use state::*;
