//! # Reconciliation Core
//!
//! A reconciliation workflow engine that matches internal ledger records
//! against bank statement records, routes differences for approval and keeps
//! a complete, undoable and audited history of every change.
//!
//! ## Features
//!
//! - **Matching**: many-to-many match groups with automatic difference and adjustment calculation
//! - **Approval workflow**: adjustments above a configurable threshold need sign-off
//! - **Period locking**: a single cutoff date freezes everything on or before it
//! - **Undo**: bounded stack of full-state checkpoints
//! - **Snapshots**: named, restorable copies of transactions and matches
//! - **Audit trail**: one append-only entry per mutation
//! - **Access control**: role based permissions with an editable permission table
//! - **Persistence abstraction**: async write-through sink behind a trait
//!
//! ## Quick Start
//!
//! ```rust
//! use reconciliation_core::{MatchStatus, RawRecord, Role, User, Workspace};
//! use chrono::NaiveDate;
//!
//! let admin = User::new("ana".to_string(), "Ana".to_string(), Role::Admin);
//! let mut workspace = Workspace::new(admin);
//!
//! let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
//! let ledger = vec![RawRecord::new("L1", "2024-07-01", "Invoice 101", "100.00")];
//! let bank = vec![RawRecord::new("R1", "2024-07-01", "Transfer in", "95.00")];
//! workspace.import_feeds(date, &ledger, &bank).unwrap();
//!
//! let group = workspace
//!     .create_match(&["L1".to_string()], &["R1".to_string()], "Bank fee")
//!     .unwrap();
//! assert_eq!(group.status, MatchStatus::Approved);
//! ```

pub mod access;
pub mod audit;
pub mod config;
pub mod history;
pub mod import;
pub mod matching;
pub mod period;
pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;
pub mod workspace;

// Re-export commonly used types
pub use access::{Permission, PermissionSet, Role, RolePermissions};
pub use audit::{AuditAction, AuditLogEntry, AuditTrail};
pub use config::ReconConfig;
pub use history::*;
pub use import::*;
pub use matching::*;
pub use period::PeriodLock;
pub use reconciliation::*;
pub use traits::*;
pub use types::*;
pub use workspace::*;

// Re-export the in-memory sink for tests and development
pub use utils::MemorySink;
