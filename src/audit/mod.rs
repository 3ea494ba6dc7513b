//! Append-only audit trail
//!
//! Every logical mutation of a workspace appends exactly one entry. Batch
//! operations record one aggregate entry rather than one per item. Entries
//! are never edited or removed.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::access::Permission;
use crate::traits::PermissionStore;
use crate::types::*;

/// Label of an audited mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Import,
    MatchCreated,
    MatchRemoved,
    BatchUnmatch,
    CommentUpdated,
    MatchApproved,
    BatchApprove,
    PeriodLocked,
    PeriodUnlocked,
    SnapshotSaved,
    SnapshotRestored,
    UserAdded,
    PermissionGranted,
    PermissionRevoked,
    RoleRequested,
    RoleRequestApproved,
    RoleRequestRejected,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Import => "IMPORT",
            AuditAction::MatchCreated => "MATCH_CREATED",
            AuditAction::MatchRemoved => "MATCH_REMOVED",
            AuditAction::BatchUnmatch => "BATCH_UNMATCH",
            AuditAction::CommentUpdated => "COMMENT_UPDATED",
            AuditAction::MatchApproved => "MATCH_APPROVED",
            AuditAction::BatchApprove => "BATCH_APPROVE",
            AuditAction::PeriodLocked => "PERIOD_LOCKED",
            AuditAction::PeriodUnlocked => "PERIOD_UNLOCKED",
            AuditAction::SnapshotSaved => "SNAPSHOT_SAVED",
            AuditAction::SnapshotRestored => "SNAPSHOT_RESTORED",
            AuditAction::UserAdded => "USER_ADDED",
            AuditAction::PermissionGranted => "PERMISSION_GRANTED",
            AuditAction::PermissionRevoked => "PERMISSION_REVOKED",
            AuditAction::RoleRequested => "ROLE_REQUESTED",
            AuditAction::RoleRequestApproved => "ROLE_REQUEST_APPROVED",
            AuditAction::RoleRequestRejected => "ROLE_REQUEST_REJECTED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub timestamp: NaiveDateTime,
    pub action: AuditAction,
    /// Human-readable summary of what changed
    pub details: String,
    pub user_id: String,
    pub user_name: String,
}

/// Ordered, append-only sequence of audit entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditTrail {
    entries: Vec<AuditLogEntry>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mutation performed by `actor`
    pub fn append(
        &mut self,
        action: AuditAction,
        details: impl Into<String>,
        actor: &User,
    ) -> &AuditLogEntry {
        let entry = AuditLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().naive_utc(),
            action,
            details: details.into(),
            user_id: actor.id.clone(),
            user_name: actor.name.clone(),
        };
        tracing::debug!(action = %entry.action, user = %entry.user_id, "Audit entry appended");
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[AuditLogEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&AuditLogEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries recorded for one action label
    pub fn with_action(&self, action: AuditAction) -> Vec<&AuditLogEntry> {
        self.entries.iter().filter(|e| e.action == action).collect()
    }

    /// Entries performed by one user
    pub fn for_user(&self, user_id: &str) -> Vec<&AuditLogEntry> {
        self.entries.iter().filter(|e| e.user_id == user_id).collect()
    }

    /// Entries `viewer` may read: everything with `view_all_logs`, otherwise
    /// only their own
    pub fn visible_to<P: PermissionStore + ?Sized>(
        &self,
        viewer: &User,
        permissions: &P,
    ) -> Vec<&AuditLogEntry> {
        if permissions.has_permission(viewer.role, Permission::ViewAllLogs) {
            self.entries.iter().collect()
        } else {
            self.for_user(&viewer.id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Role, RolePermissions};

    fn user(id: &str, role: Role) -> User {
        User::new(id.to_string(), format!("User {}", id), role)
    }

    #[test]
    fn test_append_records_actor() {
        let mut trail = AuditTrail::new();
        let alice = user("alice", Role::Reconciler);

        let entry = trail.append(AuditAction::MatchCreated, "Matched 1/1", &alice);
        assert_eq!(entry.user_id, "alice");
        assert_eq!(entry.user_name, "User alice");
        assert_eq!(entry.action.as_str(), "MATCH_CREATED");
        assert_eq!(trail.len(), 1);
    }

    #[test]
    fn test_visibility_depends_on_view_all_logs() {
        let table = RolePermissions::new();
        let mut trail = AuditTrail::new();
        let alice = user("alice", Role::Reconciler);
        let bob = user("bob", Role::Reconciler);
        let audit = user("carol", Role::Auditor);

        trail.append(AuditAction::MatchCreated, "a", &alice);
        trail.append(AuditAction::MatchRemoved, "b", &bob);
        trail.append(AuditAction::MatchCreated, "c", &alice);

        assert_eq!(trail.visible_to(&alice, &table).len(), 2);
        assert_eq!(trail.visible_to(&bob, &table).len(), 1);
        assert_eq!(trail.visible_to(&audit, &table).len(), 3);
        assert_eq!(trail.with_action(AuditAction::MatchCreated).len(), 2);
    }

    #[test]
    fn test_action_labels_serialize_in_screaming_case() {
        let json = serde_json::to_string(&AuditAction::BatchApprove).unwrap();
        assert_eq!(json, "\"BATCH_APPROVE\"");
    }
}
