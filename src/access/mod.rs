//! Roles, permissions and the default role/permission table

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::traits::PermissionStore;
use crate::types::*;

/// Actions that can be granted to a role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    PerformMatching,
    UnmatchTransactions,
    ApproveAdjustments,
    ManagePeriods,
    ExportData,
    ManageUsers,
    ViewAdminPanel,
    ViewAllLogs,
}

impl Permission {
    pub const ALL: [Permission; 8] = [
        Permission::PerformMatching,
        Permission::UnmatchTransactions,
        Permission::ApproveAdjustments,
        Permission::ManagePeriods,
        Permission::ExportData,
        Permission::ManageUsers,
        Permission::ViewAdminPanel,
        Permission::ViewAllLogs,
    ];

    /// Stable name used in logs and persisted configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::PerformMatching => "perform_matching",
            Permission::UnmatchTransactions => "unmatch_transactions",
            Permission::ApproveAdjustments => "approve_adjustments",
            Permission::ManagePeriods => "manage_periods",
            Permission::ExportData => "export_data",
            Permission::ManageUsers => "manage_users",
            Permission::ViewAdminPanel => "view_admin_panel",
            Permission::ViewAllLogs => "view_all_logs",
        }
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|permission| permission.as_str() == s)
            .ok_or_else(|| ReconError::Validation(format!("Unknown permission '{}'", s)))
    }
}

/// A set of permissions stored as a bitset
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(u16);

impl PermissionSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Self::of(&Permission::ALL)
    }

    /// Build a set from a list of permissions
    pub fn of(permissions: &[Permission]) -> Self {
        permissions
            .iter()
            .fold(Self::empty(), |set, permission| set.with(*permission))
    }

    pub fn with(mut self, permission: Permission) -> Self {
        self.insert(permission);
        self
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0 & permission.bit() != 0
    }

    /// Add a permission, returning whether the set changed
    pub fn insert(&mut self, permission: Permission) -> bool {
        let changed = !self.contains(permission);
        self.0 |= permission.bit();
        changed
    }

    /// Remove a permission, returning whether the set changed
    pub fn remove(&mut self, permission: Permission) -> bool {
        let changed = self.contains(permission);
        self.0 &= !permission.bit();
        changed
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        Permission::ALL
            .into_iter()
            .filter(move |permission| self.contains(*permission))
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Operator roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Full control, including user administration
    Admin,
    /// Signs off adjustments and closes periods
    Manager,
    /// Day-to-day matching work
    Reconciler,
    /// Read-only access to every log and export
    Auditor,
    /// Read-only access to own activity
    Viewer,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Manager,
        Role::Reconciler,
        Role::Auditor,
        Role::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Reconciler => "reconciler",
            Role::Auditor => "auditor",
            Role::Viewer => "viewer",
        }
    }

    /// Permissions granted to the role in a fresh workspace
    pub fn default_permissions(&self) -> PermissionSet {
        use Permission::*;
        match self {
            Role::Admin => PermissionSet::all(),
            Role::Manager => PermissionSet::of(&[
                PerformMatching,
                UnmatchTransactions,
                ApproveAdjustments,
                ManagePeriods,
                ExportData,
                ViewAllLogs,
            ]),
            Role::Reconciler => {
                PermissionSet::of(&[PerformMatching, UnmatchTransactions, ExportData])
            }
            Role::Auditor => PermissionSet::of(&[ExportData, ViewAdminPanel, ViewAllLogs]),
            Role::Viewer => PermissionSet::empty(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role → permission table owned by a workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermissions {
    table: BTreeMap<Role, PermissionSet>,
}

impl RolePermissions {
    /// Table populated with each role's default permissions
    pub fn new() -> Self {
        Self {
            table: Role::ALL
                .into_iter()
                .map(|role| (role, role.default_permissions()))
                .collect(),
        }
    }

    /// Table where no role holds any permission
    pub fn empty() -> Self {
        Self {
            table: BTreeMap::new(),
        }
    }

    pub fn permissions_for(&self, role: Role) -> PermissionSet {
        self.table.get(&role).copied().unwrap_or_default()
    }

    /// Grant a permission, returning whether the table changed
    pub fn grant(&mut self, role: Role, permission: Permission) -> bool {
        self.table.entry(role).or_default().insert(permission)
    }

    /// Revoke a permission, returning whether the table changed
    pub fn revoke(&mut self, role: Role, permission: Permission) -> bool {
        self.table
            .get_mut(&role)
            .is_some_and(|set| set.remove(permission))
    }
}

impl Default for RolePermissions {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionStore for RolePermissions {
    fn has_permission(&self, role: Role, permission: Permission) -> bool {
        self.permissions_for(role).contains(permission)
    }
}

/// Fail with [`ReconError::PermissionDenied`] unless `role` holds `permission`
pub fn require<P: PermissionStore + ?Sized>(
    store: &P,
    role: Role,
    permission: Permission,
) -> ReconResult<()> {
    if store.has_permission(role, permission) {
        Ok(())
    } else {
        tracing::warn!(%role, %permission, "Permission denied");
        Err(ReconError::PermissionDenied { role, permission })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_set_bit_operations() {
        let mut set = PermissionSet::empty();
        assert!(set.is_empty());

        assert!(set.insert(Permission::PerformMatching));
        assert!(!set.insert(Permission::PerformMatching));
        assert!(set.contains(Permission::PerformMatching));
        assert!(!set.contains(Permission::ManageUsers));
        assert_eq!(set.len(), 1);

        assert!(set.remove(Permission::PerformMatching));
        assert!(!set.remove(Permission::PerformMatching));
        assert!(set.is_empty());

        assert_eq!(PermissionSet::all().len(), Permission::ALL.len());
    }

    #[test]
    fn test_default_role_table() {
        let table = RolePermissions::new();

        assert!(table.has_permission(Role::Admin, Permission::ManageUsers));
        assert!(table.has_permission(Role::Manager, Permission::ApproveAdjustments));
        assert!(table.has_permission(Role::Reconciler, Permission::PerformMatching));
        assert!(!table.has_permission(Role::Reconciler, Permission::ApproveAdjustments));
        assert!(!table.has_permission(Role::Reconciler, Permission::ManagePeriods));
        assert!(table.has_permission(Role::Auditor, Permission::ViewAllLogs));
        assert!(!table.has_permission(Role::Viewer, Permission::ExportData));
    }

    #[test]
    fn test_grant_and_revoke() {
        let mut table = RolePermissions::empty();
        assert!(!table.has_permission(Role::Viewer, Permission::ExportData));

        assert!(table.grant(Role::Viewer, Permission::ExportData));
        assert!(!table.grant(Role::Viewer, Permission::ExportData));
        assert!(table.has_permission(Role::Viewer, Permission::ExportData));

        assert!(table.revoke(Role::Viewer, Permission::ExportData));
        assert!(!table.revoke(Role::Auditor, Permission::ExportData));
    }

    #[test]
    fn test_require_reports_role_and_permission() {
        let table = RolePermissions::new();
        assert!(require(&table, Role::Manager, Permission::ManagePeriods).is_ok());

        let err = require(&table, Role::Viewer, Permission::PerformMatching).unwrap_err();
        assert!(matches!(
            err,
            ReconError::PermissionDenied {
                role: Role::Viewer,
                permission: Permission::PerformMatching
            }
        ));
    }

    #[test]
    fn test_permission_names_round_trip() {
        for permission in Permission::ALL {
            assert_eq!(permission.as_str().parse::<Permission>().unwrap(), permission);
        }
        assert!("delete_everything".parse::<Permission>().is_err());
    }

    #[test]
    fn test_table_serializes_with_role_keys() {
        let table = RolePermissions::new();
        let json = serde_json::to_string(&table).unwrap();
        assert!(json.contains("\"Admin\""));
        let back: RolePermissions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
