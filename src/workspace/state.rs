//! The mutable state tuple of a workspace

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::access::RolePermissions;
use crate::audit::AuditTrail;
use crate::period::PeriodLock;
use crate::types::*;

/// Everything an undo checkpoint captures and the persistence sink receives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceState {
    pub transactions: Vec<Transaction>,
    pub matches: Vec<MatchGroup>,
    pub audit_log: AuditTrail,
    pub users: Vec<User>,
    pub role_permissions: RolePermissions,
    pub period_lock: PeriodLock,
    pub role_requests: Vec<RoleRequest>,
}

impl WorkspaceState {
    /// Empty state with the given users and the default permission table
    pub fn new(users: Vec<User>) -> Self {
        Self {
            transactions: Vec::new(),
            matches: Vec::new(),
            audit_log: AuditTrail::new(),
            users,
            role_permissions: RolePermissions::new(),
            period_lock: PeriodLock::new(),
            role_requests: Vec::new(),
        }
    }

    pub fn transaction(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    pub fn transaction_mut(&mut self, id: &str) -> Option<&mut Transaction> {
        self.transactions.iter_mut().find(|t| t.id == id)
    }

    pub fn find_match(&self, id: &str) -> Option<&MatchGroup> {
        self.matches.iter().find(|m| m.id == id)
    }

    pub fn find_match_mut(&mut self, id: &str) -> Option<&mut MatchGroup> {
        self.matches.iter_mut().find(|m| m.id == id)
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Unmatched transactions on one side, in import order
    pub fn unmatched(&self, side: Side) -> impl Iterator<Item = &Transaction> + '_ {
        self.transactions
            .iter()
            .filter(move |t| t.side == side && !t.is_matched())
    }

    /// Check the match invariant in both directions: every transaction a
    /// group references is matched to that group, and every matched
    /// transaction belongs to an existing group that lists it.
    pub fn verify_integrity(&self) -> ReconResult<()> {
        let mut seen = HashSet::new();
        for txn in &self.transactions {
            if !seen.insert(txn.id.as_str()) {
                return Err(ReconError::Validation(format!(
                    "Duplicate transaction id '{}'",
                    txn.id
                )));
            }
        }

        let mut owner: HashMap<&str, &str> = HashMap::new();
        for group in &self.matches {
            for id in group.transaction_ids() {
                let txn = self.transaction(id).ok_or_else(|| {
                    ReconError::Validation(format!(
                        "Match '{}' references unknown transaction '{}'",
                        group.id, id
                    ))
                })?;

                if !txn.is_matched() || txn.match_id.as_deref() != Some(group.id.as_str()) {
                    return Err(ReconError::Validation(format!(
                        "Transaction '{}' is not marked as matched to '{}'",
                        id, group.id
                    )));
                }

                if owner.insert(id, group.id.as_str()).is_some() {
                    return Err(ReconError::Validation(format!(
                        "Transaction '{}' belongs to more than one match",
                        id
                    )));
                }
            }
        }

        for txn in self.transactions.iter().filter(|t| t.is_matched()) {
            if !owner.contains_key(txn.id.as_str()) {
                return Err(ReconError::Validation(format!(
                    "Transaction '{}' is matched to a missing group",
                    txn.id
                )));
            }
        }

        Ok(())
    }

    /// Read-only figures for dashboards and exports
    pub fn summary(&self, write_off_limit: &BigDecimal) -> ReconciliationSummary {
        let left: Vec<&Transaction> = self.unmatched(Side::Left).collect();
        let right: Vec<&Transaction> = self.unmatched(Side::Right).collect();

        ReconciliationSummary {
            unmatched_left: left.len(),
            unmatched_right: right.len(),
            unmatched_left_total: left.iter().map(|t| &t.amount).sum(),
            unmatched_right_total: right.iter().map(|t| &t.amount).sum(),
            match_count: self.matches.len(),
            pending_approvals: self.matches.iter().filter(|m| m.is_pending()).count(),
            write_off_eligible: self
                .matches
                .iter()
                .filter(|m| m.write_off_eligible(write_off_limit))
                .count(),
            matched_value: self.matches.iter().map(|m| &m.total_left).sum(),
        }
    }

    /// Serialize for a durable sink
    pub fn to_json(&self) -> ReconResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Load a state previously written with [`WorkspaceState::to_json`]
    pub fn from_json(json: &str) -> ReconResult<Self> {
        let state: Self = serde_json::from_str(json)?;
        state.verify_integrity()?;
        Ok(state)
    }
}

/// Aggregate figures of a workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub unmatched_left: usize,
    pub unmatched_right: usize,
    pub unmatched_left_total: BigDecimal,
    pub unmatched_right_total: BigDecimal,
    pub match_count: usize,
    pub pending_approvals: usize,
    pub write_off_eligible: usize,
    /// Sum of left-side totals across all matches
    pub matched_value: BigDecimal,
}
