use std::sync::atomic::{AtomicU64, Ordering};

use ledgerguard_core::{AppError, AppResult};
use ledgerguard_domain::Permission;
use tracing::warn;

use crate::BusinessContext;

/// Registration record declaring the permission an operation requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    name: &'static str,
    required: Option<Permission>,
}

impl Operation {
    /// Declares an operation that only needs a resolved business context.
    #[must_use]
    pub const fn public(name: &'static str) -> Self {
        Self {
            name,
            required: None,
        }
    }

    /// Declares an operation guarded by one permission.
    #[must_use]
    pub const fn requires(name: &'static str, permission: Permission) -> Self {
        Self {
            name,
            required: Some(permission),
        }
    }

    /// Returns the operation name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the declared permission, if any.
    #[must_use]
    pub const fn required(&self) -> Option<Permission> {
        self.required
    }
}

/// Why a check was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Denial {
    /// Permission the operation required.
    pub required: Permission,
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Operation may proceed.
    Allow,
    /// Operation is not permitted.
    Deny(Denial),
}

impl Decision {
    /// Returns whether the decision allows the operation.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Converts a denial into a `Forbidden` error naming only the required permission.
    pub fn into_result(self) -> AppResult<()> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(denial) => Err(AppError::Forbidden(format!(
                "missing permission '{}'",
                denial.required
            ))),
        }
    }
}

/// Checks declared permissions against a resolved business context.
#[derive(Debug, Default)]
pub struct AuthorizationEnforcer {
    denials: AtomicU64,
}

impl AuthorizationEnforcer {
    /// Creates an enforcer with a zeroed denial counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether the context satisfies the required permission.
    ///
    /// Superadmins and the business owner pass every check regardless of
    /// permission overrides.
    pub fn check(&self, required: Option<Permission>, context: &BusinessContext) -> Decision {
        let Some(required) = required else {
            return Decision::Allow;
        };

        if context.is_superadmin()
            || context.is_owner()
            || context.permissions().contains(&required)
        {
            return Decision::Allow;
        }

        self.denials.fetch_add(1, Ordering::Relaxed);
        warn!(
            business_id = %context.business_id(),
            user_id = %context.user_id(),
            required = required.as_str(),
            "permission denied"
        );

        Decision::Deny(Denial { required })
    }

    /// Enforces an operation declaration, returning `Forbidden` on denial.
    pub fn enforce(&self, operation: &Operation, context: &BusinessContext) -> AppResult<()> {
        self.check(operation.required(), context).into_result()
    }

    /// Returns how many denials this enforcer has emitted.
    #[must_use]
    pub fn denial_count(&self) -> u64 {
        self.denials.load(Ordering::Relaxed)
    }
}

/// Operation declarations for the membership and audit surfaces.
pub mod operations {
    use ledgerguard_domain::Permission;

    use super::Operation;

    /// Reads the caller's own business context.
    pub const VIEW_CONTEXT: Operation = Operation::public("view_context");
    /// Accepts a pending invitation addressed to the caller.
    pub const ACCEPT_INVITATION: Operation = Operation::public("accept_invitation");
    /// Lists members of a business.
    pub const LIST_MEMBERS: Operation = Operation::requires("list_members", Permission::UserRead);
    /// Resolves another member's effective permissions.
    pub const VIEW_MEMBER_PERMISSIONS: Operation =
        Operation::requires("view_member_permissions", Permission::UserRead);
    /// Records a pending invitation.
    pub const INVITE_MEMBER: Operation =
        Operation::requires("invite_member", Permission::UserInvite);
    /// Creates or reactivates an active membership.
    pub const ASSIGN_MEMBER: Operation =
        Operation::requires("assign_member", Permission::UserInvite);
    /// Replaces a member's role.
    pub const UPDATE_ROLE: Operation =
        Operation::requires("update_role", Permission::UserUpdateRole);
    /// Replaces a member's permission overrides.
    pub const UPDATE_PERMISSIONS: Operation =
        Operation::requires("update_permissions", Permission::UserUpdatePermissions);
    /// Soft-removes a member.
    pub const REMOVE_MEMBER: Operation =
        Operation::requires("remove_member", Permission::UserRemove);
    /// Lists audit records.
    pub const LIST_AUDIT_LOG: Operation =
        Operation::requires("list_audit_log", Permission::AuditView);
}
