use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ledgerguard_core::{AppError, AppResult, BusinessId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{AuditAction, AuditEvent, Permission, RequestMetadata, Role};

/// Sparse per-membership deviations from the role defaults.
///
/// `false` removes a permission the role grants, `true` adds one. Keys are
/// kept verbatim so stored maps round-trip into audit records unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionOverrides(BTreeMap<String, bool>);

impl PermissionOverrides {
    /// Creates an empty override map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces one override.
    #[must_use]
    pub fn with(mut self, permission: Permission, allowed: bool) -> Self {
        self.0.insert(permission.as_str().to_owned(), allowed);
        self
    }

    /// Inserts one raw override key.
    pub fn insert(&mut self, key: impl Into<String>, allowed: bool) {
        self.0.insert(key.into(), allowed);
    }

    /// Returns the override for a permission, if any.
    #[must_use]
    pub fn get(&self, permission: Permission) -> Option<bool> {
        self.0.get(permission.as_str()).copied()
    }

    /// Returns whether the map holds no overrides.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates raw keys and values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(key, allowed)| (key.as_str(), *allowed))
    }

    /// Rejects keys that are not catalog permissions.
    pub fn validate(&self) -> AppResult<()> {
        let unknown: Vec<&str> = self
            .0
            .keys()
            .map(String::as_str)
            .filter(|key| Permission::from_str(key).is_err())
            .collect();

        if unknown.is_empty() {
            return Ok(());
        }

        Err(AppError::Validation(format!(
            "unknown permission override keys: {}",
            unknown.join(", ")
        )))
    }

    /// Applies the overrides on top of a base permission set.
    ///
    /// Keys are unique, so the result does not depend on application order.
    /// Keys outside the catalog cannot be represented and are skipped.
    #[must_use]
    pub fn apply_to(&self, mut base: BTreeSet<Permission>) -> BTreeSet<Permission> {
        for (key, allowed) in &self.0 {
            let Ok(permission) = Permission::from_str(key) else {
                continue;
            };

            if *allowed {
                base.insert(permission);
            } else {
                base.remove(&permission);
            }
        }

        base
    }

    /// Returns the JSON object form used in audit payloads.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(key, allowed)| (key.clone(), Value::Bool(*allowed)))
                .collect(),
        )
    }
}

impl FromIterator<(String, bool)> for PermissionOverrides {
    fn from_iter<T: IntoIterator<Item = (String, bool)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Lifecycle state of a membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    /// Membership grants access.
    Active,
    /// Membership was soft-removed and is retained for audit continuity.
    Removed,
    /// Invitation sent but not accepted yet.
    Invited,
}

impl MembershipStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Removed => "removed",
            Self::Invited => "invited",
        }
    }
}

impl FromStr for MembershipStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "removed" => Ok(Self::Removed),
            "invited" => Ok(Self::Invited),
            _ => Err(AppError::Validation(format!(
                "unknown membership status value '{value}'"
            ))),
        }
    }
}

/// Binding of one user to one business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    business_id: BusinessId,
    user_id: UserId,
    role: Role,
    status: MembershipStatus,
    is_owner: bool,
    custom_permissions: Option<PermissionOverrides>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Membership {
    /// Creates a membership from stored values.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        business_id: BusinessId,
        user_id: UserId,
        role: Role,
        status: MembershipStatus,
        is_owner: bool,
        custom_permissions: Option<PermissionOverrides>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        if !role.is_assignable() {
            return Err(AppError::Validation(format!(
                "role '{role}' cannot be held through a business membership"
            )));
        }

        Ok(Self {
            business_id,
            user_id,
            role,
            status,
            is_owner,
            custom_permissions: custom_permissions.filter(|overrides| !overrides.is_empty()),
            created_at,
            updated_at,
        })
    }

    /// Returns the business scope.
    #[must_use]
    pub fn business_id(&self) -> BusinessId {
        self.business_id
    }

    /// Returns the member.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns the assigned role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn status(&self) -> MembershipStatus {
        self.status
    }

    /// Returns whether the member owns the business.
    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    /// Returns whether the membership currently grants access.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }

    /// Returns custom overrides, if any are set.
    #[must_use]
    pub fn custom_permissions(&self) -> Option<&PermissionOverrides> {
        self.custom_permissions.as_ref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn overrides_json(&self) -> Value {
        self.custom_permissions
            .as_ref()
            .map(PermissionOverrides::to_json)
            .unwrap_or_else(|| json!({}))
    }

    fn snapshot_json(&self) -> Value {
        json!({
            "role": self.role.as_str(),
            "status": self.status.as_str(),
            "permissions": self.overrides_json(),
        })
    }
}

/// A state change requested on a membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipMutation {
    /// Record a pending invitation with the role the user will receive.
    Invite {
        /// Role granted on acceptance.
        role: Role,
    },
    /// Create or reactivate an active membership.
    Assign {
        /// Role to grant.
        role: Role,
        /// Optional overrides.
        custom_permissions: Option<PermissionOverrides>,
        /// Whether the member owns the business.
        is_owner: bool,
    },
    /// Activate a pending invitation.
    AcceptInvitation,
    /// Replace the role.
    UpdateRole {
        /// New role.
        role: Role,
    },
    /// Replace the full override map.
    UpdatePermissions {
        /// New overrides; `None` clears them.
        custom_permissions: Option<PermissionOverrides>,
    },
    /// Soft-remove the membership.
    Remove,
}

impl MembershipMutation {
    /// Returns the audit action recorded for this mutation.
    #[must_use]
    pub fn audit_action(&self) -> AuditAction {
        match self {
            Self::Invite { .. } => AuditAction::UserInvite,
            Self::Assign { .. } | Self::AcceptInvitation => AuditAction::UserAssign,
            Self::UpdateRole { .. } => AuditAction::RoleUpdate,
            Self::UpdatePermissions { .. } => AuditAction::PermissionUpdate,
            Self::Remove => AuditAction::UserRemove,
        }
    }

    /// Computes the membership state after this mutation.
    pub fn apply(
        &self,
        business_id: BusinessId,
        user_id: &UserId,
        current: Option<&Membership>,
        now: DateTime<Utc>,
    ) -> AppResult<Membership> {
        let live = current.filter(|membership| membership.status != MembershipStatus::Removed);

        match self {
            Self::Invite { role } => {
                if let Some(existing) = live {
                    return Err(AppError::Conflict(format!(
                        "user '{user_id}' already has a {} membership in business '{business_id}'",
                        existing.status.as_str()
                    )));
                }

                Membership::new(
                    business_id,
                    user_id.clone(),
                    *role,
                    MembershipStatus::Invited,
                    false,
                    None,
                    current.map_or(now, Membership::created_at),
                    now,
                )
            }
            Self::Assign {
                role,
                custom_permissions,
                is_owner,
            } => {
                if live.is_some_and(Membership::is_active) {
                    return Err(AppError::Conflict(format!(
                        "user '{user_id}' is already an active member of business '{business_id}'"
                    )));
                }

                if let Some(overrides) = custom_permissions {
                    overrides.validate()?;
                }

                Membership::new(
                    business_id,
                    user_id.clone(),
                    *role,
                    MembershipStatus::Active,
                    *is_owner,
                    custom_permissions.clone(),
                    current.map_or(now, Membership::created_at),
                    now,
                )
            }
            Self::AcceptInvitation => {
                let pending = live
                    .filter(|membership| membership.status == MembershipStatus::Invited)
                    .ok_or_else(|| {
                        AppError::NotFound(format!(
                            "no pending invitation for user '{user_id}' in business '{business_id}'"
                        ))
                    })?;

                Ok(Membership {
                    status: MembershipStatus::Active,
                    updated_at: now,
                    ..pending.clone()
                })
            }
            Self::UpdateRole { role } => {
                let existing = require_live(live, business_id, user_id)?;
                Membership::new(
                    business_id,
                    user_id.clone(),
                    *role,
                    existing.status,
                    existing.is_owner,
                    existing.custom_permissions.clone(),
                    existing.created_at,
                    now,
                )
            }
            Self::UpdatePermissions { custom_permissions } => {
                let existing = require_live(live, business_id, user_id)?;
                if let Some(overrides) = custom_permissions {
                    overrides.validate()?;
                }

                Ok(Membership {
                    custom_permissions: custom_permissions
                        .clone()
                        .filter(|overrides| !overrides.is_empty()),
                    updated_at: now,
                    ..existing.clone()
                })
            }
            Self::Remove => {
                let existing = require_live(live, business_id, user_id)?;
                Ok(Membership {
                    status: MembershipStatus::Removed,
                    updated_at: now,
                    ..existing.clone()
                })
            }
        }
    }

    /// Returns the `(old_value, new_value)` audit payloads for a transition.
    #[must_use]
    pub fn audit_values(
        &self,
        before: Option<&Membership>,
        after: &Membership,
    ) -> (Option<Value>, Option<Value>) {
        match self {
            Self::Invite { .. } | Self::Assign { .. } => {
                (before.map(Membership::snapshot_json), Some(after.snapshot_json()))
            }
            Self::AcceptInvitation => (
                Some(json!({ "status": MembershipStatus::Invited.as_str() })),
                Some(json!({ "status": after.status.as_str() })),
            ),
            Self::UpdateRole { .. } => (
                before.map(|membership| json!({ "role": membership.role.as_str() })),
                Some(json!({ "role": after.role.as_str() })),
            ),
            Self::UpdatePermissions { .. } => (
                Some(json!({
                    "permissions": before.map_or_else(|| json!({}), Membership::overrides_json)
                })),
                Some(json!({ "permissions": after.overrides_json() })),
            ),
            Self::Remove => (
                before.map(|membership| {
                    json!({
                        "role": membership.role.as_str(),
                        "status": membership.status.as_str(),
                    })
                }),
                Some(json!({ "status": after.status.as_str() })),
            ),
        }
    }
}

fn require_live<'a>(
    live: Option<&'a Membership>,
    business_id: BusinessId,
    user_id: &UserId,
) -> AppResult<&'a Membership> {
    live.ok_or_else(|| {
        AppError::NotFound(format!(
            "user '{user_id}' is not a member of business '{business_id}'"
        ))
    })
}

/// Standing of the caller requesting a membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorAuthority {
    /// System bootstrap, such as registering the owner of a new business.
    System,
    /// Platform superadmin.
    Superadmin,
    /// Owner of the business.
    Owner,
    /// Any other member, bounded by the permissions already enforced.
    Member,
}

impl ActorAuthority {
    fn is_elevated(self) -> bool {
        matches!(self, Self::System | Self::Superadmin)
    }
}

/// A membership mutation together with the attribution needed to audit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipChange {
    /// Business scope.
    pub business_id: BusinessId,
    /// Member being changed.
    pub user_id: UserId,
    /// Requested change.
    pub mutation: MembershipMutation,
    /// Caller performing the change; `None` means system.
    pub actor_user_id: Option<UserId>,
    /// Standing of the caller, checked against the stored target state.
    pub authority: ActorAuthority,
    /// Request attribution.
    pub metadata: RequestMetadata,
    /// Optional free-form note.
    pub notes: Option<String>,
}

impl MembershipChange {
    /// Applies the mutation and builds the matching audit event.
    ///
    /// Storage adapters call this inside their transactional boundary so the
    /// authority checks, the new membership row and its audit record all see
    /// the same stored state.
    pub fn resolve(
        &self,
        current: Option<&Membership>,
        now: DateTime<Utc>,
    ) -> AppResult<(Membership, AuditEvent)> {
        self.authorize(current)?;

        let next = self
            .mutation
            .apply(self.business_id, &self.user_id, current, now)?;
        let (old_value, new_value) = self.mutation.audit_values(current, &next);

        let event = AuditEvent {
            business_id: self.business_id,
            actor_user_id: self.actor_user_id.clone(),
            target_user_id: Some(self.user_id.clone()),
            action: self.mutation.audit_action(),
            old_value,
            new_value,
            ip_address: self.metadata.ip_address.clone(),
            user_agent: self.metadata.user_agent.clone(),
            notes: self.notes.clone(),
        };

        Ok((next, event))
    }

    fn authorize(&self, current: Option<&Membership>) -> AppResult<()> {
        if self.authority.is_elevated() {
            return Ok(());
        }

        if matches!(self.mutation, MembershipMutation::Assign { is_owner: true, .. }) {
            return Err(AppError::Forbidden(
                "only a superadmin may assign business ownership".to_owned(),
            ));
        }

        let grants_owner_role = matches!(
            &self.mutation,
            MembershipMutation::Invite { role }
                | MembershipMutation::Assign { role, .. }
                | MembershipMutation::UpdateRole { role } if *role == Role::Owner
        );
        if grants_owner_role && self.authority != ActorAuthority::Owner {
            return Err(AppError::Forbidden(
                "only the business owner or a superadmin may grant the owner role".to_owned(),
            ));
        }

        let edits_grants = matches!(
            self.mutation,
            MembershipMutation::UpdateRole { .. } | MembershipMutation::UpdatePermissions { .. }
        );
        if edits_grants && self.actor_user_id.as_ref() == Some(&self.user_id) {
            return Err(AppError::Forbidden(
                "members cannot change their own role or permissions".to_owned(),
            ));
        }

        let touches_existing = edits_grants || matches!(self.mutation, MembershipMutation::Remove);
        if touches_existing
            && current.is_some_and(|membership| membership.is_owner() && membership.is_active())
        {
            return Err(AppError::Forbidden(
                "the business owner can only be changed by a superadmin".to_owned(),
            ));
        }

        Ok(())
    }
}
