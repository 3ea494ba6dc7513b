//! Matching engine and approval workflow

pub mod approval;
pub mod engine;

pub use approval::*;
pub use engine::*;
