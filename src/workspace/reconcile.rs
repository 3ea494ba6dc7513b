//! Matching, approval and period operations on a workspace

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::access::Permission;
use crate::audit::AuditAction;
use crate::matching::ApprovalWorkflow;
use crate::types::*;
use crate::utils::amount::format_amount;
use crate::workspace::Workspace;

/// Result of a batch unmatch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Matches dissolved
    pub unmatched: usize,
    /// Match ids left alone because they touch the locked period
    pub skipped_locked: Vec<String>,
    /// Match ids that did not exist
    pub missing: Vec<String>,
}

impl Workspace {
    /// Reconcile the given left and right transactions as one group
    pub fn create_match(
        &mut self,
        left_ids: &[String],
        right_ids: &[String],
        comment: &str,
    ) -> ReconResult<MatchGroup> {
        if left_ids.is_empty() && right_ids.is_empty() {
            return Err(ReconError::EmptySelection);
        }
        let operator = self.authorize(Permission::PerformMatching)?;
        let group = self
            .engine
            .prepare_match(&self.state, left_ids, right_ids, comment, &operator)?;

        self.checkpoint();
        self.engine.apply_match(&mut self.state, group.clone());
        self.audit(
            AuditAction::MatchCreated,
            format!(
                "Matched {} left and {} right transactions, difference {} ({})",
                group.left.len(),
                group.right.len(),
                format_amount(&group.difference),
                group.status
            ),
            &operator,
        );
        self.selection.clear();
        Ok(group)
    }

    /// Match whatever the operator has selected, using the comment draft
    pub fn create_match_from_selection(&mut self) -> ReconResult<MatchGroup> {
        let left = self.selection.left_ids();
        let right = self.selection.right_ids();
        let comment = self.selection.comment().to_string();
        self.create_match(&left, &right, &comment)
    }

    /// Dissolve a match, returning the removed group
    pub fn unmatch(&mut self, match_id: &str) -> ReconResult<MatchGroup> {
        let operator = self.authorize(Permission::UnmatchTransactions)?;
        self.engine.check_unmatch(&self.state, match_id)?;

        self.checkpoint();
        let group = self
            .engine
            .apply_unmatch(&mut self.state, match_id)
            .ok_or_else(|| ReconError::MatchNotFound(match_id.to_string()))?;
        self.audit(
            AuditAction::MatchRemoved,
            format!(
                "Removed match of {} transactions, difference {}",
                group.transaction_count(),
                format_amount(&group.difference)
            ),
            &operator,
        );
        self.selection.clear_items();
        Ok(group)
    }

    /// Dissolve several matches at once, skipping locked and unknown ones
    pub fn batch_unmatch(&mut self, match_ids: &[String]) -> ReconResult<BatchOutcome> {
        if match_ids.is_empty() {
            return Err(ReconError::EmptySelection);
        }
        let operator = self.authorize(Permission::UnmatchTransactions)?;
        let partition = self.engine.partition_for_unmatch(&self.state, match_ids);

        if !partition.locked.is_empty() {
            tracing::warn!(
                skipped = partition.locked.len(),
                "Locked matches skipped in batch unmatch"
            );
        }

        if partition.valid.is_empty() {
            return match (partition.locked.is_empty(), self.state.period_lock.cutoff()) {
                (false, Some(cutoff)) => Err(ReconError::PeriodLocked { cutoff }),
                _ => Err(ReconError::EmptySelection),
            };
        }

        self.checkpoint();
        let mut unmatched = 0;
        for id in &partition.valid {
            if self.engine.apply_unmatch(&mut self.state, id).is_some() {
                unmatched += 1;
            }
        }

        let mut details = format!("Removed {} matches", unmatched);
        if !partition.locked.is_empty() {
            details.push_str(&format!(
                ", skipped {} in locked period",
                partition.locked.len()
            ));
        }
        self.audit(AuditAction::BatchUnmatch, details, &operator);
        self.selection.clear_items();

        Ok(BatchOutcome {
            unmatched,
            skipped_locked: partition.locked,
            missing: partition.missing,
        })
    }

    /// Batch unmatch over the matches selected in the history view
    pub fn unmatch_selected(&mut self) -> ReconResult<BatchOutcome> {
        let ids = self.selection.match_ids();
        self.batch_unmatch(&ids)
    }

    /// Replace a match's comment
    pub fn update_comment(&mut self, match_id: &str, comment: &str) -> ReconResult<()> {
        let operator = self.operator()?;
        let group = self
            .state
            .find_match(match_id)
            .ok_or_else(|| ReconError::MatchNotFound(match_id.to_string()))?;
        self.state.period_lock.check(group.dates())?;

        self.checkpoint();
        if let Some(group) = self.state.find_match_mut(match_id) {
            group.comment = comment.trim().to_string();
        }
        self.audit(
            AuditAction::CommentUpdated,
            format!("Updated comment on match {}", match_id),
            &operator,
        );
        Ok(())
    }

    /// Sign off a pending match
    ///
    /// Returns `false` without recording anything when the match is
    /// already approved.
    pub fn approve(&mut self, match_id: &str) -> ReconResult<bool> {
        let operator = self.authorize(Permission::ApproveAdjustments)?;
        let group = self
            .state
            .find_match(match_id)
            .ok_or_else(|| ReconError::MatchNotFound(match_id.to_string()))?;
        if !ApprovalWorkflow::can_approve(group) {
            return Ok(false);
        }

        self.checkpoint();
        let now = chrono::Utc::now().naive_utc();
        let mut adjustment = String::new();
        if let Some(group) = self.state.find_match_mut(match_id) {
            ApprovalWorkflow::approve(group, &operator, now);
            adjustment = group.adjustment.as_ref().map(format_amount).unwrap_or_default();
        }
        self.audit(
            AuditAction::MatchApproved,
            format!("Approved adjustment of {} on match {}", adjustment, match_id),
            &operator,
        );
        Ok(true)
    }

    /// Approve every pending match among `match_ids`, returning how many moved
    pub fn batch_approve(&mut self, match_ids: &[String]) -> ReconResult<usize> {
        let operator = self.authorize(Permission::ApproveAdjustments)?;
        let eligible = ApprovalWorkflow::eligible(&self.state, match_ids);
        if eligible.is_empty() {
            return Ok(0);
        }

        self.checkpoint();
        let now = chrono::Utc::now().naive_utc();
        let approved = ApprovalWorkflow::approve_all(&mut self.state, &eligible, &operator, now);
        self.audit(
            AuditAction::BatchApprove,
            format!("Approved {} matches", approved),
            &operator,
        );
        tracing::info!(approved, requested = match_ids.len(), "Batch approval applied");
        Ok(approved)
    }

    /// Batch approval over the matches selected in the history view
    pub fn approve_selected(&mut self) -> ReconResult<usize> {
        let ids = self.selection.match_ids();
        let approved = self.batch_approve(&ids)?;
        self.selection.clear_items();
        Ok(approved)
    }

    /// Move or clear the period-lock cutoff
    ///
    /// Returns `false` when the cutoff is already at the requested value.
    pub fn set_locked_date(&mut self, cutoff: Option<NaiveDate>) -> ReconResult<bool> {
        let operator = self.authorize(Permission::ManagePeriods)?;
        if self.state.period_lock.cutoff() == cutoff {
            return Ok(false);
        }

        self.checkpoint();
        self.state.period_lock.set_cutoff(cutoff);
        let (action, details) = match cutoff {
            Some(date) => (
                AuditAction::PeriodLocked,
                format!("Locked period through {}", date),
            ),
            None => (AuditAction::PeriodUnlocked, "Removed period lock".to_string()),
        };
        self.audit(action, details, &operator);
        tracing::info!(cutoff = ?cutoff, "Period lock updated");
        Ok(true)
    }
}
