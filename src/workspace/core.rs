//! Workspace orchestrator: construction, history and import

use chrono::NaiveDate;
use std::collections::HashSet;

use crate::access::{self, Permission};
use crate::audit::{AuditAction, AuditLogEntry};
use crate::config::ReconConfig;
use crate::history::{CheckpointStore, SnapshotKind, SnapshotStore, SystemSnapshot};
use crate::import::{ImportBatch, ImportReport, RawRecord};
use crate::matching::{ApprovalWorkflow, MatchingEngine};
use crate::traits::*;
use crate::types::*;
use crate::utils::amount::format_amount;
use crate::workspace::{ReconciliationSummary, Selection, WorkspaceState};

/// All reconciliation state of one operator session
///
/// Every mutating operation follows the same sequence: authorize, check the
/// period lock and other preconditions, push a checkpoint, mutate, append one
/// audit entry. A failed check leaves the workspace exactly as it was.
pub struct Workspace {
    pub(crate) state: WorkspaceState,
    pub(crate) operator_id: String,
    home_operator_id: String,
    pub(crate) config: ReconConfig,
    pub(crate) engine: MatchingEngine,
    pub(crate) checkpoints: CheckpointStore,
    pub(crate) snapshots: SnapshotStore,
    pub(crate) selection: Selection,
    pub(crate) selected_date: Option<NaiveDate>,
    validator: Box<dyn RecordValidator>,
}

impl Workspace {
    /// Create an empty workspace operated by `operator`
    pub fn new(operator: User) -> Self {
        let operator_id = operator.id.clone();
        Self::assemble(
            WorkspaceState::new(vec![operator]),
            operator_id,
            ReconConfig::default(),
        )
    }

    /// Create an empty workspace with custom limits
    pub fn with_config(operator: User, config: ReconConfig) -> ReconResult<Self> {
        config.validate()?;
        let operator_id = operator.id.clone();
        Ok(Self::assemble(
            WorkspaceState::new(vec![operator]),
            operator_id,
            config,
        ))
    }

    /// Resume a workspace from a persisted state
    pub fn from_state(
        state: WorkspaceState,
        operator_id: &str,
        config: ReconConfig,
    ) -> ReconResult<Self> {
        config.validate()?;
        state.verify_integrity()?;
        if state.user(operator_id).is_none() {
            return Err(ReconError::UnknownUser(operator_id.to_string()));
        }
        Ok(Self::assemble(state, operator_id.to_string(), config))
    }

    /// Replace the import row validator
    pub fn with_validator(mut self, validator: Box<dyn RecordValidator>) -> Self {
        self.validator = validator;
        self
    }

    fn assemble(state: WorkspaceState, operator_id: String, config: ReconConfig) -> Self {
        Self {
            engine: MatchingEngine::new(&config),
            checkpoints: CheckpointStore::new(config.checkpoint_capacity),
            snapshots: SnapshotStore::new(config.snapshot_retention),
            selection: Selection::new(),
            selected_date: None,
            validator: Box::new(DefaultRecordValidator),
            state,
            home_operator_id: operator_id.clone(),
            operator_id,
            config,
        }
    }

    /// Hand the session over to another known user
    pub fn switch_operator(&mut self, user_id: &str) -> ReconResult<()> {
        if self.state.user(user_id).is_none() {
            return Err(ReconError::UnknownUser(user_id.to_string()));
        }
        self.operator_id = user_id.to_string();
        self.selection.clear();
        tracing::info!(operator = %user_id, "Operator switched");
        Ok(())
    }

    // Accessors

    pub fn state(&self) -> &WorkspaceState {
        &self.state
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.state.transactions
    }

    /// Match list, read-only, as handed to exporters
    pub fn matches(&self) -> &[MatchGroup] {
        &self.state.matches
    }

    pub fn find_match(&self, match_id: &str) -> Option<&MatchGroup> {
        self.state.find_match(match_id)
    }

    pub fn audit_log(&self) -> &[AuditLogEntry] {
        self.state.audit_log.entries()
    }

    /// Audit entries the current operator is allowed to read
    pub fn visible_audit_log(&self) -> ReconResult<Vec<&AuditLogEntry>> {
        let operator = self.operator()?;
        Ok(self
            .state
            .audit_log
            .visible_to(&operator, &self.state.role_permissions))
    }

    pub fn pending_approvals(&self) -> Vec<&MatchGroup> {
        ApprovalWorkflow::pending(&self.state.matches)
    }

    pub fn locked_date(&self) -> Option<NaiveDate> {
        self.state.period_lock.cutoff()
    }

    pub fn selected_date(&self) -> Option<NaiveDate> {
        self.selected_date
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    pub fn checkpoint_depth(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn snapshots(&self) -> &[SystemSnapshot] {
        self.snapshots.list()
    }

    pub fn snapshot(&self, snapshot_id: &str) -> Option<&SystemSnapshot> {
        self.snapshots.get(snapshot_id)
    }

    pub fn summary(&self) -> ReconciliationSummary {
        self.state.summary(self.engine.write_off_limit())
    }

    /// The user currently operating the workspace
    pub fn operator(&self) -> ReconResult<User> {
        self.state
            .user(&self.operator_id)
            .cloned()
            .ok_or_else(|| ReconError::UnknownUser(self.operator_id.clone()))
    }

    /// Resolve the operator and check they hold `permission`
    pub(crate) fn authorize(&self, permission: Permission) -> ReconResult<User> {
        let operator = self.operator()?;
        access::require(&self.state.role_permissions, operator.role, permission)?;
        Ok(operator)
    }

    pub(crate) fn checkpoint(&mut self) {
        self.checkpoints.save(&self.state);
    }

    pub(crate) fn audit(&mut self, action: AuditAction, details: impl Into<String>, actor: &User) {
        self.state.audit_log.append(action, details, actor);
    }

    // History

    /// Revert the most recent mutation
    ///
    /// Returns `false` when there is nothing to undo. A checkpoint that fails
    /// verification is discarded and reported; the workspace and the rest of
    /// the stack are left untouched.
    ///
    /// If the restored state predates the current operator, the session falls
    /// back to the user it was opened with.
    pub fn undo(&mut self) -> ReconResult<bool> {
        let Some(checkpoint) = self.checkpoints.pop() else {
            return Ok(false);
        };

        if let Err(err) = checkpoint.verify() {
            tracing::error!(
                taken_at = %checkpoint.taken_at(),
                error = %err,
                "Discarding corrupt checkpoint"
            );
            return Err(err);
        }

        if checkpoint.state().user(&self.operator_id).is_none() {
            if checkpoint.state().user(&self.home_operator_id).is_none() {
                let missing = self.operator_id.clone();
                self.checkpoints.restore(checkpoint);
                return Err(ReconError::UnknownUser(missing));
            }
            tracing::warn!(
                operator = %self.operator_id,
                fallback = %self.home_operator_id,
                "Operator does not exist before this change, switching back"
            );
            self.operator_id = self.home_operator_id.clone();
            self.selection.clear();
        }

        self.state = checkpoint.into_state();
        self.selection.clear_items();
        tracing::info!(remaining = self.checkpoints.len(), "Undo applied");
        Ok(true)
    }

    /// Save a named snapshot of the current transactions and matches
    pub fn save_snapshot(&mut self, label: &str) -> ReconResult<SystemSnapshot> {
        let operator = self.operator()?;
        let label = label.trim();
        if label.is_empty() {
            return Err(ReconError::Validation(
                "Snapshot label cannot be empty".to_string(),
            ));
        }

        self.checkpoint();
        let snapshot = self.capture(label.to_string(), SnapshotKind::Manual, &operator);
        self.audit(
            AuditAction::SnapshotSaved,
            format!(
                "Saved snapshot '{}' ({} transactions, {} matches)",
                snapshot.label, snapshot.stats.transaction_count, snapshot.stats.match_count
            ),
            &operator,
        );
        Ok(snapshot)
    }

    /// Replace transactions, matches and the active date with a snapshot's
    pub fn restore_snapshot(
        &mut self,
        snapshot_id: &str,
        gate: &dyn ConfirmationGate,
    ) -> ReconResult<()> {
        let operator = self.operator()?;
        let snapshot = self
            .snapshots
            .get(snapshot_id)
            .cloned()
            .ok_or_else(|| ReconError::SnapshotNotFound(snapshot_id.to_string()))?;

        let prompt = format!(
            "Restore snapshot '{}' from {}? Current matching work will be replaced.",
            snapshot.label, snapshot.created_at
        );
        if !gate.confirm(&prompt) {
            tracing::info!(snapshot_id = %snapshot.id, "Snapshot restore declined");
            return Err(ReconError::ConfirmationDeclined);
        }

        self.checkpoint();
        self.state.transactions = snapshot.transactions;
        self.state.matches = snapshot.matches;
        self.selected_date = snapshot.selected_date;
        self.selection.clear();
        self.audit(
            AuditAction::SnapshotRestored,
            format!(
                "Restored snapshot '{}' taken at {}",
                snapshot.label, snapshot.created_at
            ),
            &operator,
        );
        tracing::info!(snapshot_id = %snapshot.id, label = %snapshot.label, "Snapshot restored");
        Ok(())
    }

    fn capture(&mut self, label: String, kind: SnapshotKind, operator: &User) -> SystemSnapshot {
        let snapshot = SystemSnapshot::capture(
            label,
            kind,
            &self.state.transactions,
            &self.state.matches,
            self.selected_date,
            &operator.id,
        );
        self.snapshots.push(snapshot).clone()
    }

    // Import

    /// Land a pair of feeds for `date`
    ///
    /// Invalid rows and ids already present are dropped and counted. The
    /// import is checkpointed once and followed by an import snapshot.
    pub fn import_feeds(
        &mut self,
        date: NaiveDate,
        left: &[RawRecord],
        right: &[RawRecord],
    ) -> ReconResult<ImportReport> {
        let operator = self.operator()?;
        let batch = {
            let existing: HashSet<&str> = self
                .state
                .transactions
                .iter()
                .map(|t| t.id.as_str())
                .collect();
            ImportBatch::prepare(left, right, &existing, self.validator.as_ref())
        };

        if batch.imported() == 0 && batch.skipped == 0 {
            return Err(ReconError::EmptySelection);
        }

        self.checkpoint();
        let imported_left = batch.left.len();
        let imported_right = batch.right.len();
        let left_total: bigdecimal::BigDecimal = batch.left.iter().map(|t| &t.amount).sum();
        let right_total: bigdecimal::BigDecimal = batch.right.iter().map(|t| &t.amount).sum();
        self.state.transactions.extend(batch.left);
        self.state.transactions.extend(batch.right);
        self.selected_date = Some(date);
        self.selection.clear();

        self.audit(
            AuditAction::Import,
            format!(
                "Imported {} left ({}) and {} right ({}) transactions for {}; {} rows skipped",
                imported_left,
                format_amount(&left_total),
                imported_right,
                format_amount(&right_total),
                date,
                batch.skipped
            ),
            &operator,
        );

        let snapshot = self.capture(format!("Import {}", date), SnapshotKind::Import, &operator);
        tracing::info!(
            %date,
            left = imported_left,
            right = imported_right,
            skipped = batch.skipped,
            "Feeds imported"
        );

        Ok(ImportReport {
            date,
            imported_left,
            imported_right,
            skipped: batch.skipped,
            snapshot_id: snapshot.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use bigdecimal::BigDecimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn workspace() -> Workspace {
        Workspace::new(User::new("ana".to_string(), "Ana".to_string(), Role::Admin))
    }

    fn feeds() -> (Vec<RawRecord>, Vec<RawRecord>) {
        (
            vec![
                RawRecord::new("L1", "2024-07-01", "Invoice 101", "100.00"),
                RawRecord::new("L2", "2024-07-02", "Invoice 102", "500.00"),
            ],
            vec![
                RawRecord::new("R1", "2024-07-01", "Transfer in", "95.00"),
                RawRecord::new("R2", "2024-07-03", "Transfer in", "485.00"),
                RawRecord::new("R3", "bad-date", "Transfer in", "1.00"),
            ],
        )
    }

    #[test]
    fn test_import_lands_rows_and_snapshot() {
        let mut ws = workspace();
        let (left, right) = feeds();

        let report = ws.import_feeds(date(2024, 7, 3), &left, &right).unwrap();

        assert_eq!(report.imported_left, 2);
        assert_eq!(report.imported_right, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(ws.transactions().len(), 4);
        assert_eq!(ws.selected_date(), Some(date(2024, 7, 3)));
        assert_eq!(ws.checkpoint_depth(), 1);
        assert_eq!(ws.audit_log().len(), 1);
        assert_eq!(ws.audit_log()[0].action, AuditAction::Import);

        let snapshot = ws.snapshot(&report.snapshot_id).unwrap();
        assert_eq!(snapshot.kind, SnapshotKind::Import);
        assert_eq!(snapshot.stats.transaction_count, 4);
    }

    #[test]
    fn test_reimport_skips_known_ids() {
        let mut ws = workspace();
        let (left, right) = feeds();
        ws.import_feeds(date(2024, 7, 3), &left, &right).unwrap();

        let report = ws.import_feeds(date(2024, 7, 3), &left, &[]).unwrap();
        assert_eq!(report.imported_left, 0);
        assert_eq!(report.skipped, 2);
        assert_eq!(ws.transactions().len(), 4);
    }

    #[test]
    fn test_empty_import_is_a_no_op() {
        let mut ws = workspace();
        assert!(matches!(
            ws.import_feeds(date(2024, 7, 3), &[], &[]),
            Err(ReconError::EmptySelection)
        ));
        assert_eq!(ws.checkpoint_depth(), 0);
        assert!(ws.audit_log().is_empty());
    }

    #[test]
    fn test_undo_restores_previous_tuple() {
        let mut ws = workspace();
        let (left, right) = feeds();
        let before = ws.state().clone();

        ws.import_feeds(date(2024, 7, 3), &left, &right).unwrap();
        assert!(ws.undo().unwrap());
        assert_eq!(ws.state(), &before);
        assert!(!ws.undo().unwrap());
    }

    #[test]
    fn test_undo_past_operator_creation_falls_back_to_session_owner() {
        let mut ws = workspace();
        ws.add_user(User::new(
            "rita".to_string(),
            "Rita".to_string(),
            Role::Reconciler,
        ))
        .unwrap();
        ws.switch_operator("rita").unwrap();

        assert!(ws.undo().unwrap());
        assert!(ws.state().user("rita").is_none());
        assert_eq!(ws.operator().unwrap().id, "ana");
        assert!(ws.save_snapshot("after undo").is_ok());
    }

    #[test]
    fn test_undo_keeps_checkpoint_when_no_operator_survives() {
        let mut ws = workspace();
        ws.checkpoints.save(&WorkspaceState::new(Vec::new()));
        let current = ws.state().clone();

        assert!(matches!(ws.undo(), Err(ReconError::UnknownUser(id)) if id == "ana"));
        assert_eq!(ws.state(), &current);
        assert_eq!(ws.checkpoint_depth(), 1);
    }

    #[test]
    fn test_undo_discards_corrupt_checkpoint_only() {
        let mut ws = workspace();
        let (left, right) = feeds();
        ws.import_feeds(date(2024, 7, 3), &left, &right).unwrap();
        ws.save_snapshot("good").unwrap();

        let mut corrupt = ws.state().clone();
        corrupt.transactions[0].mark_matched("ghost");
        ws.checkpoints.save(&corrupt);
        let current = ws.state().clone();

        assert!(matches!(ws.undo(), Err(ReconError::CorruptCheckpoint(_))));
        assert_eq!(ws.state(), &current);
        assert_eq!(ws.checkpoint_depth(), 2);

        assert!(ws.undo().unwrap());
        assert_eq!(ws.audit_log().len(), 1);
    }

    #[test]
    fn test_manual_snapshot_and_restore() {
        let mut ws = workspace();
        let (left, right) = feeds();
        ws.import_feeds(date(2024, 7, 3), &left, &right).unwrap();

        let saved = ws.save_snapshot("Before matching").unwrap();
        assert_eq!(saved.kind, SnapshotKind::Manual);
        assert_eq!(ws.checkpoint_depth(), 2);

        ws.state.transactions.clear();
        ws.selected_date = None;
        ws.selection_mut().toggle_left("L1");
        ws.selection_mut().set_comment("draft");

        assert!(matches!(
            ws.restore_snapshot(&saved.id, &DeclineAll),
            Err(ReconError::ConfirmationDeclined)
        ));
        assert!(ws.transactions().is_empty());
        assert_eq!(ws.checkpoint_depth(), 2);

        ws.restore_snapshot(&saved.id, &AutoConfirm).unwrap();
        assert_eq!(ws.transactions().len(), 4);
        assert_eq!(ws.selected_date(), Some(date(2024, 7, 3)));
        assert!(ws.selection().is_empty());
        assert_eq!(ws.selection().comment(), "");
        assert_eq!(ws.checkpoint_depth(), 3);

        let last = ws.audit_log().last().unwrap();
        assert_eq!(last.action, AuditAction::SnapshotRestored);
        assert!(last.details.contains("Before matching"));
    }

    #[test]
    fn test_restore_unknown_snapshot() {
        let mut ws = workspace();
        assert!(matches!(
            ws.restore_snapshot("nope", &AutoConfirm),
            Err(ReconError::SnapshotNotFound(_))
        ));
    }

    #[test]
    fn test_snapshot_retention_from_config() {
        let config = ReconConfig {
            snapshot_retention: Some(2),
            ..ReconConfig::default()
        };
        let mut ws = Workspace::with_config(
            User::new("ana".to_string(), "Ana".to_string(), Role::Admin),
            config,
        )
        .unwrap();

        for label in ["a", "b", "c"] {
            ws.save_snapshot(label).unwrap();
        }
        let labels: Vec<&str> = ws.snapshots().iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["b", "c"]);
    }

    #[test]
    fn test_from_state_requires_known_operator() {
        let ws = workspace();
        let state = ws.state().clone();

        assert!(Workspace::from_state(state.clone(), "ana", ReconConfig::default()).is_ok());
        assert!(matches!(
            Workspace::from_state(state, "ghost", ReconConfig::default()),
            Err(ReconError::UnknownUser(_))
        ));
    }

    #[test]
    fn test_summary_counts_unmatched() {
        let mut ws = workspace();
        let (left, right) = feeds();
        ws.import_feeds(date(2024, 7, 3), &left, &right).unwrap();

        let summary = ws.summary();
        assert_eq!(summary.unmatched_left, 2);
        assert_eq!(summary.unmatched_right_total, BigDecimal::from(580));
    }
}
