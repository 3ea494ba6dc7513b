//! Sign-off of match adjustments
//!
//! A match enters `PendingApproval` only when the engine routes it there.
//! `Approved` is terminal: there is no reverse transition and no rejection
//! state for matches. Disputed matches are unmatched instead.

use chrono::NaiveDateTime;
use std::collections::HashSet;

use crate::types::*;
use crate::workspace::WorkspaceState;

/// Transitions matches from pending to approved
pub struct ApprovalWorkflow;

impl ApprovalWorkflow {
    /// Whether the group is waiting for sign-off
    pub fn can_approve(group: &MatchGroup) -> bool {
        group.status == MatchStatus::PendingApproval
    }

    /// Approve a single group, returning `false` if it was not pending
    pub fn approve(group: &mut MatchGroup, approver: &User, at: NaiveDateTime) -> bool {
        match group.status {
            MatchStatus::Approved => false,
            MatchStatus::PendingApproval => {
                group.status = MatchStatus::Approved;
                group.approved_by = Some(approver.name.clone());
                group.approved_at = Some(at);
                tracing::info!(match_id = %group.id, approver = %approver.id, "Match approved");
                true
            }
        }
    }

    /// The subset of `match_ids` that is currently pending, deduplicated
    pub fn eligible(state: &WorkspaceState, match_ids: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        match_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter(|id| state.find_match(id).is_some_and(Self::can_approve))
            .cloned()
            .collect()
    }

    /// Approve every eligible group in one pass, returning how many moved
    pub fn approve_all(
        state: &mut WorkspaceState,
        match_ids: &[String],
        approver: &User,
        at: NaiveDateTime,
    ) -> usize {
        let mut approved = 0;
        for id in match_ids {
            if let Some(group) = state.find_match_mut(id) {
                if Self::approve(group, approver, at) {
                    approved += 1;
                }
            }
        }
        approved
    }

    /// Groups waiting for sign-off, in creation order
    pub fn pending(matches: &[MatchGroup]) -> Vec<&MatchGroup> {
        matches.iter().filter(|m| Self::can_approve(m)).collect()
    }
}
