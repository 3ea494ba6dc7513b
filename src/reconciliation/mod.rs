//! Async session layer over a reconciliation workspace

pub mod session;

pub use session::*;
