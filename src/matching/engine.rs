//! Match group construction and dissolution

use bigdecimal::BigDecimal;
use std::collections::HashSet;

use crate::config::ReconConfig;
use crate::types::*;
use crate::workspace::WorkspaceState;

/// Creates and dissolves match groups and decides their approval routing
///
/// The engine never checkpoints or audits on its own. Each operation comes in
/// two halves: a read-only `prepare_*`/`check_*` step that enforces every
/// precondition, and an `apply_*` step that performs the mutation and cannot
/// fail. The workspace checkpoints between the two.
#[derive(Debug, Clone)]
pub struct MatchingEngine {
    approval_threshold: BigDecimal,
    write_off_limit: BigDecimal,
}

impl MatchingEngine {
    /// Create an engine with the thresholds from `config`
    pub fn new(config: &ReconConfig) -> Self {
        Self {
            approval_threshold: config.approval_threshold.clone(),
            write_off_limit: config.write_off_limit.clone(),
        }
    }

    pub fn approval_threshold(&self) -> &BigDecimal {
        &self.approval_threshold
    }

    pub fn write_off_limit(&self) -> &BigDecimal {
        &self.write_off_limit
    }

    /// Adjustment and initial status for a given difference
    pub fn route(&self, difference: &BigDecimal) -> (Option<BigDecimal>, MatchStatus) {
        if *difference <= BigDecimal::from(0) {
            return (None, MatchStatus::Approved);
        }

        let status = if *difference > self.approval_threshold {
            MatchStatus::PendingApproval
        } else {
            MatchStatus::Approved
        };
        (Some(difference.clone()), status)
    }

    /// Whether a group's adjustment is small enough for a write-off
    pub fn is_write_off_eligible(&self, group: &MatchGroup) -> bool {
        group.write_off_eligible(&self.write_off_limit)
    }

    /// Validate a proposed match and build the group without touching state
    pub fn prepare_match(
        &self,
        state: &WorkspaceState,
        left_ids: &[String],
        right_ids: &[String],
        comment: &str,
        creator: &User,
    ) -> ReconResult<MatchGroup> {
        if left_ids.is_empty() && right_ids.is_empty() {
            return Err(ReconError::EmptySelection);
        }

        let mut seen = HashSet::new();
        let left = Self::collect_side(state, left_ids, Side::Left, &mut seen)?;
        let right = Self::collect_side(state, right_ids, Side::Right, &mut seen)?;

        state
            .period_lock
            .check(left.iter().chain(right.iter()).map(|t| t.date))?;

        let total_left: BigDecimal = left.iter().map(|t| &t.amount).sum();
        let total_right: BigDecimal = right.iter().map(|t| &t.amount).sum();
        let difference = (&total_left - &total_right).abs();
        let (adjustment, status) = self.route(&difference);

        let id = uuid::Uuid::new_v4().to_string();
        let capture = |txns: Vec<&Transaction>| -> Vec<Transaction> {
            txns.into_iter()
                .map(|t| {
                    let mut copy = t.clone();
                    copy.mark_matched(&id);
                    copy
                })
                .collect()
        };
        let left = capture(left);
        let right = capture(right);

        Ok(MatchGroup {
            id: id.clone(),
            left,
            right,
            total_left,
            total_right,
            difference,
            adjustment,
            comment: comment.trim().to_string(),
            status,
            created_by: creator.id.clone(),
            created_at: chrono::Utc::now().naive_utc(),
            approved_by: None,
            approved_at: None,
        })
    }

    /// Flag the group's transactions as matched and store the group
    pub fn apply_match(&self, state: &mut WorkspaceState, group: MatchGroup) {
        for id in group.transaction_ids() {
            if let Some(txn) = state.transaction_mut(id) {
                txn.mark_matched(&group.id);
            }
        }

        tracing::info!(
            match_id = %group.id,
            left = group.left.len(),
            right = group.right.len(),
            difference = %group.difference,
            status = %group.status,
            "Match created"
        );
        state.matches.push(group);
    }

    /// Check that a match exists and is outside the locked period
    pub fn check_unmatch(&self, state: &WorkspaceState, match_id: &str) -> ReconResult<()> {
        let group = state
            .find_match(match_id)
            .ok_or_else(|| ReconError::MatchNotFound(match_id.to_string()))?;
        state.period_lock.check(group.dates())
    }

    /// Release the group's transactions and remove the group
    pub fn apply_unmatch(&self, state: &mut WorkspaceState, match_id: &str) -> Option<MatchGroup> {
        let index = state.matches.iter().position(|m| m.id == match_id)?;
        let group = state.matches.remove(index);

        for id in group.transaction_ids() {
            if let Some(txn) = state.transaction_mut(id) {
                txn.mark_unmatched();
            }
        }

        tracing::info!(match_id = %group.id, transactions = group.transaction_count(), "Match removed");
        Some(group)
    }

    /// Split match ids into unlockable ones, locked ones and unknown ones
    pub fn partition_for_unmatch(&self, state: &WorkspaceState, match_ids: &[String]) -> Partition {
        let mut partition = Partition::default();
        let mut seen = HashSet::new();

        for id in match_ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            match state.find_match(id) {
                None => partition.missing.push(id.clone()),
                Some(group) if group.dates().any(|d| state.period_lock.is_locked(d)) => {
                    partition.locked.push(id.clone())
                }
                Some(_) => partition.valid.push(id.clone()),
            }
        }

        partition
    }

    fn collect_side<'a>(
        state: &'a WorkspaceState,
        ids: &'a [String],
        side: Side,
        seen: &mut HashSet<&'a str>,
    ) -> ReconResult<Vec<&'a Transaction>> {
        ids.iter()
            .map(|id| {
                if !seen.insert(id.as_str()) {
                    return Err(ReconError::Validation(format!(
                        "Transaction '{}' selected more than once",
                        id
                    )));
                }

                let txn = state
                    .transaction(id)
                    .ok_or_else(|| ReconError::TransactionNotFound(id.clone()))?;

                if txn.side != side {
                    return Err(ReconError::Validation(format!(
                        "Transaction '{}' is on the {} side, not the {} side",
                        id, txn.side, side
                    )));
                }

                if txn.is_matched() {
                    return Err(ReconError::AlreadyMatched(id.clone()));
                }

                Ok(txn)
            })
            .collect()
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new(&ReconConfig::default())
    }
}

/// Match ids sorted by whether a batch unmatch may touch them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub valid: Vec<String>,
    pub locked: Vec<String>,
    pub missing: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::period::PeriodLock;
    use crate::utils::amount::from_cents;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn admin() -> User {
        User::new("u1".to_string(), "Ana".to_string(), Role::Admin)
    }

    fn state_with(txns: &[(&str, i64, Side, (i32, u32, u32))]) -> WorkspaceState {
        let mut state = WorkspaceState::new(vec![admin()]);
        state.transactions = txns
            .iter()
            .map(|(id, amount, side, (y, m, d))| {
                Transaction::new(
                    id.to_string(),
                    NaiveDate::from_ymd_opt(*y, *m, *d).unwrap(),
                    format!("Record {}", id),
                    BigDecimal::from(*amount),
                    *side,
                )
            })
            .collect();
        state
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_small_difference_is_approved() {
        let engine = MatchingEngine::default();
        let mut state = state_with(&[
            ("L1", 100, Side::Left, (2024, 7, 1)),
            ("R1", 95, Side::Right, (2024, 7, 1)),
        ]);

        let group = engine
            .prepare_match(&state, &ids(&["L1"]), &ids(&["R1"]), " fee ", &admin())
            .unwrap();
        assert_eq!(group.difference, BigDecimal::from(5));
        assert_eq!(group.adjustment, Some(BigDecimal::from(5)));
        assert_eq!(group.status, MatchStatus::Approved);
        assert_eq!(group.comment, "fee");

        let match_id = group.id.clone();
        engine.apply_match(&mut state, group);
        assert!(state.verify_integrity().is_ok());
        assert_eq!(
            state.transaction("R1").unwrap().match_id.as_deref(),
            Some(match_id.as_str())
        );
    }

    #[test]
    fn test_large_difference_needs_approval() {
        let engine = MatchingEngine::default();
        let state = state_with(&[
            ("L1", 500, Side::Left, (2024, 7, 1)),
            ("R1", 485, Side::Right, (2024, 7, 1)),
        ]);

        let group = engine
            .prepare_match(&state, &ids(&["L1"]), &ids(&["R1"]), "", &admin())
            .unwrap();
        assert_eq!(group.difference, BigDecimal::from(15));
        assert_eq!(group.status, MatchStatus::PendingApproval);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let engine = MatchingEngine::default();
        assert_eq!(engine.approval_threshold(), &BigDecimal::from(10));
        assert_eq!(engine.route(&BigDecimal::from(10)).1, MatchStatus::Approved);
        assert_eq!(
            engine.route(&BigDecimal::new(1001.into(), 2)).1,
            MatchStatus::PendingApproval
        );
        assert_eq!(engine.route(&BigDecimal::from(0)), (None, MatchStatus::Approved));
    }

    #[test]
    fn test_write_off_flag_does_not_change_routing() {
        let engine = MatchingEngine::default();
        let state = state_with(&[
            ("L1", 100, Side::Left, (2024, 7, 1)),
            ("R1", 100, Side::Right, (2024, 7, 1)),
            ("R2", 0, Side::Right, (2024, 7, 1)),
        ]);
        let mut group = engine
            .prepare_match(&state, &ids(&["L1"]), &ids(&["R1", "R2"]), "", &admin())
            .unwrap();
        assert!(!engine.is_write_off_eligible(&group));

        group.adjustment = Some(BigDecimal::new(30.into(), 2));
        assert!(engine.is_write_off_eligible(&group));
        assert_eq!(group.status, MatchStatus::Approved);
    }

    #[test]
    fn test_one_sided_match_allowed() {
        let engine = MatchingEngine::default();
        let state = state_with(&[
            ("L1", 40, Side::Left, (2024, 7, 1)),
            ("L2", -40, Side::Left, (2024, 7, 1)),
        ]);
        let group = engine
            .prepare_match(&state, &ids(&["L1", "L2"]), &[], "reversal", &admin())
            .unwrap();
        assert_eq!(group.difference, BigDecimal::from(0));
        assert!(group.adjustment.is_none());
    }

    #[test]
    fn test_prepare_rejects_bad_selections() {
        let engine = MatchingEngine::default();
        let mut state = state_with(&[
            ("L1", 100, Side::Left, (2024, 7, 1)),
            ("R1", 100, Side::Right, (2024, 7, 1)),
            ("R2", 100, Side::Right, (2024, 6, 1)),
        ]);

        assert!(matches!(
            engine.prepare_match(&state, &[], &[], "", &admin()),
            Err(ReconError::EmptySelection)
        ));
        assert!(matches!(
            engine.prepare_match(&state, &ids(&["nope"]), &[], "", &admin()),
            Err(ReconError::TransactionNotFound(_))
        ));
        assert!(matches!(
            engine.prepare_match(&state, &ids(&["R1"]), &[], "", &admin()),
            Err(ReconError::Validation(_))
        ));
        assert!(matches!(
            engine.prepare_match(&state, &ids(&["L1", "L1"]), &[], "", &admin()),
            Err(ReconError::Validation(_))
        ));

        state.period_lock = PeriodLock::at(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
        assert!(matches!(
            engine.prepare_match(&state, &ids(&["L1"]), &ids(&["R2"]), "", &admin()),
            Err(ReconError::PeriodLocked { .. })
        ));

        state.transaction_mut("R1").unwrap().mark_matched("other");
        assert!(matches!(
            engine.prepare_match(&state, &ids(&["L1"]), &ids(&["R1"]), "", &admin()),
            Err(ReconError::AlreadyMatched(id)) if id == "R1"
        ));
    }

    #[test]
    fn test_unmatch_round_trip() {
        let engine = MatchingEngine::default();
        let mut state = state_with(&[
            ("L1", 100, Side::Left, (2024, 7, 1)),
            ("R1", 95, Side::Right, (2024, 7, 1)),
        ]);
        let before = state.transactions.clone();

        let group = engine
            .prepare_match(&state, &ids(&["L1"]), &ids(&["R1"]), "", &admin())
            .unwrap();
        let match_id = group.id.clone();
        engine.apply_match(&mut state, group);

        engine.check_unmatch(&state, &match_id).unwrap();
        let removed = engine.apply_unmatch(&mut state, &match_id).unwrap();
        assert_eq!(removed.id, match_id);
        assert!(state.matches.is_empty());
        assert_eq!(state.transactions, before);
    }

    #[test]
    fn test_partition_for_unmatch() {
        let engine = MatchingEngine::default();
        let mut state = state_with(&[
            ("L1", 100, Side::Left, (2024, 6, 1)),
            ("R1", 100, Side::Right, (2024, 6, 1)),
            ("L2", 50, Side::Left, (2024, 7, 5)),
            ("R2", 50, Side::Right, (2024, 7, 5)),
        ]);
        let old = engine
            .prepare_match(&state, &ids(&["L1"]), &ids(&["R1"]), "", &admin())
            .unwrap();
        let old_id = old.id.clone();
        engine.apply_match(&mut state, old);
        let new = engine
            .prepare_match(&state, &ids(&["L2"]), &ids(&["R2"]), "", &admin())
            .unwrap();
        let new_id = new.id.clone();
        engine.apply_match(&mut state, new);

        state.period_lock = PeriodLock::at(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
        let partition = engine.partition_for_unmatch(
            &state,
            &[old_id.clone(), new_id.clone(), new_id.clone(), "ghost".to_string()],
        );

        assert_eq!(partition.valid, vec![new_id]);
        assert_eq!(partition.locked, vec![old_id]);
        assert_eq!(partition.missing, vec!["ghost".to_string()]);
    }

    proptest! {
        #[test]
        fn property_difference_and_routing(
            left in proptest::collection::vec(-1_000_000i64..1_000_000, 1..4),
            right in proptest::collection::vec(-1_000_000i64..1_000_000, 0..4),
        ) {
            let engine = MatchingEngine::default();
            let mut state = WorkspaceState::new(vec![admin()]);
            let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
            let mut left_ids = Vec::new();
            let mut right_ids = Vec::new();
            for (i, cents) in left.iter().enumerate() {
                let id = format!("L{}", i);
                state.transactions.push(Transaction::new(id.clone(), date, "x".to_string(), from_cents(*cents), Side::Left));
                left_ids.push(id);
            }
            for (i, cents) in right.iter().enumerate() {
                let id = format!("R{}", i);
                state.transactions.push(Transaction::new(id.clone(), date, "x".to_string(), from_cents(*cents), Side::Right));
                right_ids.push(id);
            }

            let group = engine
                .prepare_match(&state, &left_ids, &right_ids, "", &admin())
                .unwrap();

            let expected = (left.iter().sum::<i64>() - right.iter().sum::<i64>()).abs();
            prop_assert_eq!(&group.difference, &from_cents(expected));
            prop_assert_eq!(group.adjustment.is_some(), expected > 0);
            prop_assert_eq!(group.status == MatchStatus::PendingApproval, expected > 1_000);
        }
    }
}
