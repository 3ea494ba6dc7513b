//! Traits for the collaborators around the reconciliation core

use async_trait::async_trait;

use crate::access::{Permission, Role};
use crate::import::RawRecord;
use crate::types::*;
use crate::utils::validation::*;
use crate::workspace::WorkspaceState;

/// Persistence sink for the workspace state
///
/// The core writes the full state tuple through after every successful
/// mutation. Implementations decide where it lands (database row, file,
/// object store, in-memory buffer for tests).
#[async_trait]
pub trait StateSink: Send + Sync {
    /// Store the latest state, replacing whatever was stored before
    async fn persist(&mut self, state: &WorkspaceState) -> ReconResult<()>;
}

/// Source of truth for role permissions
pub trait PermissionStore: Send + Sync {
    /// Whether `role` may perform `permission`
    fn has_permission(&self, role: Role, permission: Permission) -> bool;
}

/// Asks the operator to confirm a destructive action
pub trait ConfirmationGate {
    /// Return `true` to go ahead
    fn confirm(&self, prompt: &str) -> bool;
}

/// Gate that confirms every prompt, for scripted and batch use
pub struct AutoConfirm;

impl ConfirmationGate for AutoConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Gate that declines every prompt
pub struct DeclineAll;

impl ConfirmationGate for DeclineAll {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

/// Trait for turning an imported row into a transaction
pub trait RecordValidator: Send + Sync {
    /// Validate a raw row and convert it into an unmatched transaction
    fn validate_record(&self, record: &RawRecord, side: Side) -> ReconResult<Transaction>;
}

/// Default validator: non-empty id and description, `YYYY-MM-DD` date and a
/// numeric amount
pub struct DefaultRecordValidator;

impl RecordValidator for DefaultRecordValidator {
    fn validate_record(&self, record: &RawRecord, side: Side) -> ReconResult<Transaction> {
        if record.id.trim().is_empty() {
            return Err(ReconError::Validation(
                "Record ID cannot be empty".to_string(),
            ));
        }

        if record.description.trim().is_empty() {
            return Err(ReconError::Validation(format!(
                "Record '{}' has an empty description",
                record.id
            )));
        }

        let date = parse_iso_date(&record.date)?;
        let amount = parse_amount(&record.amount)?;

        let transaction = Transaction::new(
            record.id.trim().to_string(),
            date,
            record.description.trim().to_string(),
            amount,
            side,
        );

        Ok(match record.reference.as_deref().map(str::trim) {
            Some(reference) if !reference.is_empty() => {
                transaction.with_reference(reference.to_string())
            }
            _ => transaction,
        })
    }
}
