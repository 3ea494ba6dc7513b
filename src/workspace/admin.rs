//! User and role administration

use crate::access::{Permission, Role};
use crate::audit::AuditAction;
use crate::types::*;
use crate::utils::validation::{validate_name, validate_record_id};
use crate::workspace::Workspace;

impl Workspace {
    pub fn users(&self) -> &[User] {
        &self.state.users
    }

    pub fn role_requests(&self) -> &[RoleRequest] {
        &self.state.role_requests
    }

    pub fn pending_role_requests(&self) -> Vec<&RoleRequest> {
        self.state
            .role_requests
            .iter()
            .filter(|r| r.is_pending())
            .collect()
    }

    /// Register a new operator
    pub fn add_user(&mut self, user: User) -> ReconResult<()> {
        let operator = self.authorize(Permission::ManageUsers)?;
        validate_record_id(&user.id)?;
        validate_name(&user.name)?;
        if self.state.user(&user.id).is_some() {
            return Err(ReconError::Validation(format!(
                "User '{}' already exists",
                user.id
            )));
        }

        self.checkpoint();
        let details = format!("Added user {} ({}) as {}", user.name, user.id, user.role);
        tracing::info!(user = %user.id, role = %user.role, "User added");
        self.state.users.push(user);
        self.audit(AuditAction::UserAdded, details, &operator);
        Ok(())
    }

    /// Give `role` an extra permission, returning whether anything changed
    pub fn grant_permission(&mut self, role: Role, permission: Permission) -> ReconResult<bool> {
        let operator = self.authorize(Permission::ManageUsers)?;
        if self.state.role_permissions.permissions_for(role).contains(permission) {
            return Ok(false);
        }

        self.checkpoint();
        self.state.role_permissions.grant(role, permission);
        self.audit(
            AuditAction::PermissionGranted,
            format!("Granted {} to {}", permission, role),
            &operator,
        );
        Ok(true)
    }

    /// Take a permission away from `role`, returning whether anything changed
    pub fn revoke_permission(&mut self, role: Role, permission: Permission) -> ReconResult<bool> {
        let operator = self.authorize(Permission::ManageUsers)?;
        if !self.state.role_permissions.permissions_for(role).contains(permission) {
            return Ok(false);
        }

        self.checkpoint();
        self.state.role_permissions.revoke(role, permission);
        self.audit(
            AuditAction::PermissionRevoked,
            format!("Revoked {} from {}", permission, role),
            &operator,
        );
        Ok(true)
    }

    /// File a request for the operator to move to `role`
    pub fn request_role(&mut self, role: Role, reason: &str) -> ReconResult<String> {
        let operator = self.operator()?;
        if operator.role == role {
            return Err(ReconError::Validation(format!(
                "User '{}' already has role {}",
                operator.id, role
            )));
        }
        if self
            .state
            .role_requests
            .iter()
            .any(|r| r.user_id == operator.id && r.is_pending())
        {
            return Err(ReconError::Validation(format!(
                "User '{}' already has a pending role request",
                operator.id
            )));
        }

        self.checkpoint();
        let request = RoleRequest::new(operator.id.clone(), role, reason.trim().to_string());
        let id = request.id.clone();
        self.state.role_requests.push(request);
        self.audit(
            AuditAction::RoleRequested,
            format!("Requested role {} (currently {})", role, operator.role),
            &operator,
        );
        Ok(id)
    }

    /// Approve or reject a pending role request
    pub fn resolve_role_request(&mut self, request_id: &str, approve: bool) -> ReconResult<()> {
        let operator = self.authorize(Permission::ManageUsers)?;
        let request = self
            .state
            .role_requests
            .iter()
            .find(|r| r.id == request_id)
            .ok_or_else(|| ReconError::RoleRequestNotFound(request_id.to_string()))?;
        if !request.is_pending() {
            return Err(ReconError::Validation(format!(
                "Role request '{}' was already resolved",
                request_id
            )));
        }
        let (user_id, role) = (request.user_id.clone(), request.requested_role);
        if self.state.user(&user_id).is_none() {
            return Err(ReconError::UnknownUser(user_id));
        }

        self.checkpoint();
        let now = chrono::Utc::now().naive_utc();
        if let Some(request) = self
            .state
            .role_requests
            .iter_mut()
            .find(|r| r.id == request_id)
        {
            request.status = if approve {
                RequestStatus::Approved
            } else {
                RequestStatus::Rejected
            };
            request.resolved_by = Some(operator.id.clone());
            request.resolved_at = Some(now);
        }

        let action = if approve {
            if let Some(user) = self.state.users.iter_mut().find(|u| u.id == user_id) {
                user.role = role;
            }
            AuditAction::RoleRequestApproved
        } else {
            AuditAction::RoleRequestRejected
        };
        self.audit(
            action,
            format!("Request by {} for role {}", user_id, role),
            &operator,
        );
        tracing::info!(request = %request_id, user = %user_id, %role, approve, "Role request resolved");
        Ok(())
    }
}
