//! Core types and data structures for the reconciliation engine

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::access::{Permission, Role};

/// The feed a transaction was imported from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Internal ledger
    Left,
    /// Bank statement
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconciliation status of a single transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    Unmatched,
    Matched,
}

/// A single record from one of the two feeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Identifier supplied by the importer, unique within a workspace
    pub id: String,
    /// Booking date of the record
    pub date: NaiveDate,
    /// Free-text description from the feed
    pub description: String,
    /// Signed amount in the workspace currency
    pub amount: BigDecimal,
    /// Optional reference number (cheque number, bank reference, etc.)
    pub reference: Option<String>,
    /// Which feed this record belongs to
    pub side: Side,
    /// Whether the record is part of a match group
    pub status: TransactionStatus,
    /// Id of the owning match group while matched
    pub match_id: Option<String>,
}

impl Transaction {
    /// Create a new unmatched transaction
    pub fn new(
        id: String,
        date: NaiveDate,
        description: String,
        amount: BigDecimal,
        side: Side,
    ) -> Self {
        Self {
            id,
            date,
            description,
            amount,
            reference: None,
            side,
            status: TransactionStatus::Unmatched,
            match_id: None,
        }
    }

    /// Attach a reference number
    pub fn with_reference(mut self, reference: String) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn is_matched(&self) -> bool {
        self.status == TransactionStatus::Matched
    }

    pub(crate) fn mark_matched(&mut self, match_id: &str) {
        self.status = TransactionStatus::Matched;
        self.match_id = Some(match_id.to_string());
    }

    pub(crate) fn mark_unmatched(&mut self) {
        self.status = TransactionStatus::Unmatched;
        self.match_id = None;
    }
}

/// Approval state of a match group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchStatus {
    /// Reconciled, either directly or after sign-off
    Approved,
    /// Adjustment above the approval threshold, waiting for sign-off
    PendingApproval,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStatus::Approved => f.write_str("approved"),
            MatchStatus::PendingApproval => f.write_str("pending approval"),
        }
    }
}

/// A set of left-side and right-side transactions reconciled as one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchGroup {
    /// Unique identifier for the group
    pub id: String,
    /// Left-side transactions, copied at creation time
    pub left: Vec<Transaction>,
    /// Right-side transactions, copied at creation time
    pub right: Vec<Transaction>,
    /// Sum of left-side amounts
    pub total_left: BigDecimal,
    /// Sum of right-side amounts
    pub total_right: BigDecimal,
    /// Absolute gap between the two totals
    pub difference: BigDecimal,
    /// Equal to the difference whenever it is nonzero
    pub adjustment: Option<BigDecimal>,
    /// Operator comment explaining the match
    pub comment: String,
    pub status: MatchStatus,
    /// User id of the operator who created the group
    pub created_by: String,
    pub created_at: NaiveDateTime,
    /// Name of the approver, once approved through the workflow
    pub approved_by: Option<String>,
    pub approved_at: Option<NaiveDateTime>,
}

impl MatchGroup {
    /// Ids of every transaction in the group, left side first
    pub fn transaction_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.left
            .iter()
            .chain(self.right.iter())
            .map(|txn| txn.id.as_str())
    }

    /// Booking dates of every transaction in the group
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.left.iter().chain(self.right.iter()).map(|txn| txn.date)
    }

    pub fn transaction_count(&self) -> usize {
        self.left.len() + self.right.len()
    }

    pub fn is_pending(&self) -> bool {
        self.status == MatchStatus::PendingApproval
    }

    /// Whether the adjustment is small enough to qualify for a write-off.
    ///
    /// Advisory only: routing is decided by the approval threshold alone.
    pub fn write_off_eligible(&self, limit: &BigDecimal) -> bool {
        self.adjustment
            .as_ref()
            .is_some_and(|adjustment| adjustment <= limit)
    }
}

/// An operator known to the workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: Role,
}

impl User {
    pub fn new(id: String, name: String, role: Role) -> Self {
        Self { id, name, role }
    }
}

/// Lifecycle of a role change request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// A request by an operator to be moved to a different role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRequest {
    pub id: String,
    pub user_id: String,
    pub requested_role: Role,
    pub reason: String,
    pub status: RequestStatus,
    pub created_at: NaiveDateTime,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<NaiveDateTime>,
}

impl RoleRequest {
    /// Create a new pending request
    pub fn new(user_id: String, requested_role: Role, reason: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            requested_role,
            reason,
            status: RequestStatus::Pending,
            created_at: chrono::Utc::now().naive_utc(),
            resolved_by: None,
            resolved_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

/// Errors that can occur in the reconciliation engine
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    #[error("Permission denied: role '{role}' lacks '{permission}'")]
    PermissionDenied { role: Role, permission: Permission },
    #[error("Period locked: transactions dated on or before {cutoff} cannot be changed")]
    PeriodLocked { cutoff: NaiveDate },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Nothing selected")]
    EmptySelection,
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Transaction already matched: {0}")]
    AlreadyMatched(String),
    #[error("Match not found: {0}")]
    MatchNotFound(String),
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),
    #[error("Role request not found: {0}")]
    RoleRequestNotFound(String),
    #[error("Unknown user: {0}")]
    UnknownUser(String),
    #[error("Restore was not confirmed")]
    ConfirmationDeclined,
    #[error("Corrupt checkpoint: {0}")]
    CorruptCheckpoint(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReconError {
    /// Whether the error should be shown to the operator.
    ///
    /// An empty selection is a silent no-op guard.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, ReconError::EmptySelection)
    }
}

/// Result type for reconciliation operations
pub type ReconResult<T> = Result<T, ReconError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn txn(id: &str, amount: i64, side: Side) -> Transaction {
        Transaction::new(
            id.to_string(),
            NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            "Wire".to_string(),
            BigDecimal::from(amount),
            side,
        )
    }

    #[test]
    fn test_transaction_match_flags() {
        let mut t = txn("L1", 100, Side::Left);
        assert!(!t.is_matched());

        t.mark_matched("m1");
        assert_eq!(t.status, TransactionStatus::Matched);
        assert_eq!(t.match_id.as_deref(), Some("m1"));

        t.mark_unmatched();
        assert_eq!(t.status, TransactionStatus::Unmatched);
        assert!(t.match_id.is_none());
    }

    #[test]
    fn test_write_off_eligibility_is_bounded_by_limit() {
        let limit = BigDecimal::new(50.into(), 2);
        let mut group = MatchGroup {
            id: "m1".to_string(),
            left: vec![txn("L1", 100, Side::Left)],
            right: vec![txn("R1", 100, Side::Right)],
            total_left: BigDecimal::from(100),
            total_right: BigDecimal::from(100),
            difference: BigDecimal::from(0),
            adjustment: None,
            comment: String::new(),
            status: MatchStatus::Approved,
            created_by: "u1".to_string(),
            created_at: chrono::Utc::now().naive_utc(),
            approved_by: None,
            approved_at: None,
        };
        assert!(!group.write_off_eligible(&limit));

        group.adjustment = Some(BigDecimal::new(25.into(), 2));
        assert!(group.write_off_eligible(&limit));

        group.adjustment = Some(BigDecimal::from(1));
        assert!(!group.write_off_eligible(&limit));
        assert_eq!(group.transaction_ids().collect::<Vec<_>>(), vec!["L1", "R1"]);
    }

    #[test]
    fn test_empty_selection_is_silent() {
        assert!(!ReconError::EmptySelection.is_user_facing());
        assert!(ReconError::MatchNotFound("m1".to_string()).is_user_facing());
    }
}
