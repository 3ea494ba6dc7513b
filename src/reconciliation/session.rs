//! Session orchestrator that writes the workspace through to a sink

use chrono::NaiveDate;

use crate::access::{Permission, Role};
use crate::config::ReconConfig;
use crate::history::SystemSnapshot;
use crate::import::{ImportReport, RawRecord};
use crate::traits::*;
use crate::types::*;
use crate::workspace::{BatchOutcome, Selection, Workspace, WorkspaceState};

/// A workspace bound to a persistence sink
///
/// Every mutation runs synchronously against the workspace, then the full
/// state is handed to the sink. A failed write is logged and returned; the
/// in-memory mutation is kept.
pub struct ReconciliationSession<S: StateSink> {
    workspace: Workspace,
    sink: S,
}

impl<S: StateSink> ReconciliationSession<S> {
    /// Create a session around an existing workspace
    pub fn new(workspace: Workspace, sink: S) -> Self {
        Self { workspace, sink }
    }

    /// Rebuild a session from a previously persisted state
    pub fn resume(
        state: WorkspaceState,
        operator_id: &str,
        config: ReconConfig,
        sink: S,
    ) -> ReconResult<Self> {
        let workspace = Workspace::from_state(state, operator_id, config)?;
        tracing::info!(operator = %operator_id, "Session resumed from persisted state");
        Ok(Self::new(workspace, sink))
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        self.workspace.selection_mut()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_parts(self) -> (Workspace, S) {
        (self.workspace, self.sink)
    }

    /// Hand the session over to another known user
    pub fn switch_operator(&mut self, user_id: &str) -> ReconResult<()> {
        self.workspace.switch_operator(user_id)
    }

    async fn persist(&mut self) -> ReconResult<()> {
        if let Err(err) = self.sink.persist(self.workspace.state()).await {
            tracing::error!(error = %err, "Failed to persist workspace state");
            return Err(err);
        }
        Ok(())
    }

    async fn persist_if(&mut self, changed: bool) -> ReconResult<()> {
        if changed {
            self.persist().await
        } else {
            Ok(())
        }
    }

    // Import and history

    /// Land a pair of feeds for `date`
    pub async fn import_feeds(
        &mut self,
        date: NaiveDate,
        left: &[RawRecord],
        right: &[RawRecord],
    ) -> ReconResult<ImportReport> {
        let report = self.workspace.import_feeds(date, left, right)?;
        self.persist().await?;
        Ok(report)
    }

    /// Revert the most recent mutation
    pub async fn undo(&mut self) -> ReconResult<bool> {
        let undone = self.workspace.undo()?;
        self.persist_if(undone).await?;
        Ok(undone)
    }

    pub async fn save_snapshot(&mut self, label: &str) -> ReconResult<SystemSnapshot> {
        let snapshot = self.workspace.save_snapshot(label)?;
        self.persist().await?;
        Ok(snapshot)
    }

    pub async fn restore_snapshot(
        &mut self,
        snapshot_id: &str,
        gate: &dyn ConfirmationGate,
    ) -> ReconResult<()> {
        self.workspace.restore_snapshot(snapshot_id, gate)?;
        self.persist().await
    }

    // Matching

    pub async fn create_match(
        &mut self,
        left_ids: &[String],
        right_ids: &[String],
        comment: &str,
    ) -> ReconResult<MatchGroup> {
        let group = self.workspace.create_match(left_ids, right_ids, comment)?;
        self.persist().await?;
        Ok(group)
    }

    pub async fn create_match_from_selection(&mut self) -> ReconResult<MatchGroup> {
        let group = self.workspace.create_match_from_selection()?;
        self.persist().await?;
        Ok(group)
    }

    pub async fn unmatch(&mut self, match_id: &str) -> ReconResult<MatchGroup> {
        let group = self.workspace.unmatch(match_id)?;
        self.persist().await?;
        Ok(group)
    }

    pub async fn batch_unmatch(&mut self, match_ids: &[String]) -> ReconResult<BatchOutcome> {
        let outcome = self.workspace.batch_unmatch(match_ids)?;
        self.persist().await?;
        Ok(outcome)
    }

    pub async fn unmatch_selected(&mut self) -> ReconResult<BatchOutcome> {
        let outcome = self.workspace.unmatch_selected()?;
        self.persist().await?;
        Ok(outcome)
    }

    pub async fn update_comment(&mut self, match_id: &str, comment: &str) -> ReconResult<()> {
        self.workspace.update_comment(match_id, comment)?;
        self.persist().await
    }

    // Approval and periods

    pub async fn approve(&mut self, match_id: &str) -> ReconResult<bool> {
        let approved = self.workspace.approve(match_id)?;
        self.persist_if(approved).await?;
        Ok(approved)
    }

    pub async fn batch_approve(&mut self, match_ids: &[String]) -> ReconResult<usize> {
        let approved = self.workspace.batch_approve(match_ids)?;
        self.persist_if(approved > 0).await?;
        Ok(approved)
    }

    pub async fn approve_selected(&mut self) -> ReconResult<usize> {
        let approved = self.workspace.approve_selected()?;
        self.persist_if(approved > 0).await?;
        Ok(approved)
    }

    pub async fn set_locked_date(&mut self, cutoff: Option<NaiveDate>) -> ReconResult<bool> {
        let changed = self.workspace.set_locked_date(cutoff)?;
        self.persist_if(changed).await?;
        Ok(changed)
    }

    // Administration

    pub async fn add_user(&mut self, user: User) -> ReconResult<()> {
        self.workspace.add_user(user)?;
        self.persist().await
    }

    pub async fn grant_permission(&mut self, role: Role, permission: Permission) -> ReconResult<bool> {
        let changed = self.workspace.grant_permission(role, permission)?;
        self.persist_if(changed).await?;
        Ok(changed)
    }

    pub async fn revoke_permission(
        &mut self,
        role: Role,
        permission: Permission,
    ) -> ReconResult<bool> {
        let changed = self.workspace.revoke_permission(role, permission)?;
        self.persist_if(changed).await?;
        Ok(changed)
    }

    pub async fn request_role(&mut self, role: Role, reason: &str) -> ReconResult<String> {
        let id = self.workspace.request_role(role, reason)?;
        self.persist().await?;
        Ok(id)
    }

    pub async fn resolve_role_request(&mut self, request_id: &str, approve: bool) -> ReconResult<()> {
        self.workspace.resolve_role_request(request_id, approve)?;
        self.persist().await
    }
}
