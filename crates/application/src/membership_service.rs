use std::collections::BTreeSet;
use std::sync::Arc;

use ledgerguard_core::{AppError, AppResult, BusinessId, Identity, UserId};
use ledgerguard_domain::{
    ActorAuthority, AuditRecord, Membership, MembershipChange, MembershipMutation, Permission,
    PermissionOverrides, RequestMetadata, Role,
};

use crate::{
    AuditRecorder, AuthorizationEnforcer, BusinessContext, EffectivePermissionResolver,
    MembershipRepository, Operation, operations,
};

/// Input for creating or reactivating an active membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignMemberInput {
    /// Member to assign.
    pub user_id: UserId,
    /// Role to grant.
    pub role: Role,
    /// Optional overrides.
    pub custom_permissions: Option<PermissionOverrides>,
    /// Marks the member as business owner; only superadmins may set this.
    pub is_owner: bool,
}

/// Result of a membership mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipUpdate {
    /// Membership after the change.
    pub membership: Membership,
    /// Audit record written with the change.
    pub audit_record: AuditRecord,
}

/// Application service for business membership administration.
#[derive(Clone)]
pub struct MembershipService {
    memberships: Arc<dyn MembershipRepository>,
    recorder: AuditRecorder,
    permissions: EffectivePermissionResolver,
    enforcer: Arc<AuthorizationEnforcer>,
}

impl MembershipService {
    /// Creates a membership service.
    #[must_use]
    pub fn new(
        memberships: Arc<dyn MembershipRepository>,
        recorder: AuditRecorder,
        permissions: EffectivePermissionResolver,
        enforcer: Arc<AuthorizationEnforcer>,
    ) -> Self {
        Self {
            memberships,
            recorder,
            permissions,
            enforcer,
        }
    }

    /// Lists members of the context business.
    pub async fn list_members(
        &self,
        context: &BusinessContext,
        include_removed: bool,
    ) -> AppResult<Vec<Membership>> {
        self.enforcer.enforce(&operations::LIST_MEMBERS, context)?;
        self.memberships
            .list_memberships(context.business_id(), include_removed)
            .await
    }

    /// Resolves another member's effective permission set.
    pub async fn effective_permissions_for(
        &self,
        context: &BusinessContext,
        user_id: &UserId,
    ) -> AppResult<BTreeSet<Permission>> {
        self.enforcer
            .enforce(&operations::VIEW_MEMBER_PERMISSIONS, context)?;
        let membership = self.require_active(context.business_id(), user_id).await?;

        Ok(self
            .permissions
            .resolve(membership.role(), membership.custom_permissions()))
    }

    /// Records a pending invitation.
    pub async fn invite_member(
        &self,
        context: &BusinessContext,
        user_id: UserId,
        role: Role,
        metadata: RequestMetadata,
    ) -> AppResult<MembershipUpdate> {
        self.commit(
            context,
            &operations::INVITE_MEMBER,
            user_id,
            MembershipMutation::Invite { role },
            metadata,
        )
        .await
    }

    /// Creates or reactivates an active membership.
    pub async fn assign_member(
        &self,
        context: &BusinessContext,
        input: AssignMemberInput,
        metadata: RequestMetadata,
    ) -> AppResult<MembershipUpdate> {
        self.commit(
            context,
            &operations::ASSIGN_MEMBER,
            input.user_id,
            MembershipMutation::Assign {
                role: input.role,
                custom_permissions: input.custom_permissions,
                is_owner: input.is_owner,
            },
            metadata,
        )
        .await
    }

    /// Registers the owner of a newly created business on behalf of the system.
    pub async fn register_owner(
        &self,
        business_id: BusinessId,
        owner_user_id: UserId,
        metadata: RequestMetadata,
    ) -> AppResult<MembershipUpdate> {
        let (membership, audit_record) = self
            .recorder
            .commit(MembershipChange {
                business_id,
                user_id: owner_user_id,
                mutation: MembershipMutation::Assign {
                    role: Role::Owner,
                    custom_permissions: None,
                    is_owner: true,
                },
                actor_user_id: None,
                authority: ActorAuthority::System,
                metadata,
                notes: Some("business created".to_owned()),
            })
            .await?;

        Ok(MembershipUpdate {
            membership,
            audit_record,
        })
    }

    /// Activates a pending invitation addressed to the caller.
    pub async fn accept_invitation(
        &self,
        identity: &Identity,
        business_id: BusinessId,
        metadata: RequestMetadata,
    ) -> AppResult<MembershipUpdate> {
        let (membership, audit_record) = self
            .recorder
            .commit(MembershipChange {
                business_id,
                user_id: identity.user_id().clone(),
                mutation: MembershipMutation::AcceptInvitation,
                actor_user_id: Some(identity.user_id().clone()),
                authority: ActorAuthority::Member,
                metadata,
                notes: None,
            })
            .await?;

        Ok(MembershipUpdate {
            membership,
            audit_record,
        })
    }

    /// Replaces a member's role.
    pub async fn update_role(
        &self,
        context: &BusinessContext,
        user_id: UserId,
        role: Role,
        metadata: RequestMetadata,
    ) -> AppResult<MembershipUpdate> {
        self.commit(
            context,
            &operations::UPDATE_ROLE,
            user_id,
            MembershipMutation::UpdateRole { role },
            metadata,
        )
        .await
    }

    /// Replaces a member's full override map; `None` clears it.
    pub async fn update_permissions(
        &self,
        context: &BusinessContext,
        user_id: UserId,
        custom_permissions: Option<PermissionOverrides>,
        metadata: RequestMetadata,
    ) -> AppResult<MembershipUpdate> {
        self.commit(
            context,
            &operations::UPDATE_PERMISSIONS,
            user_id,
            MembershipMutation::UpdatePermissions { custom_permissions },
            metadata,
        )
        .await
    }

    /// Soft-removes a member.
    pub async fn remove_member(
        &self,
        context: &BusinessContext,
        user_id: UserId,
        metadata: RequestMetadata,
    ) -> AppResult<MembershipUpdate> {
        self.commit(
            context,
            &operations::REMOVE_MEMBER,
            user_id,
            MembershipMutation::Remove,
            metadata,
        )
        .await
    }

    async fn commit(
        &self,
        context: &BusinessContext,
        operation: &Operation,
        user_id: UserId,
        mutation: MembershipMutation,
        metadata: RequestMetadata,
    ) -> AppResult<MembershipUpdate> {
        self.enforcer.enforce(operation, context)?;

        if let MembershipMutation::Invite { role }
        | MembershipMutation::Assign { role, .. }
        | MembershipMutation::UpdateRole { role } = &mutation
            && !role.is_assignable()
        {
            return Err(AppError::Validation(format!(
                "role '{role}' cannot be assigned to a business member"
            )));
        }

        let (membership, audit_record) = self
            .recorder
            .commit(MembershipChange {
                business_id: context.business_id(),
                user_id,
                mutation,
                actor_user_id: Some(context.user_id().clone()),
                authority: authority_of(context),
                metadata,
                notes: None,
            })
            .await?;

        Ok(MembershipUpdate {
            membership,
            audit_record,
        })
    }

    async fn require_active(&self, business_id: BusinessId, user_id: &UserId) -> AppResult<Membership> {
        self.memberships
            .find_membership(business_id, user_id)
            .await?
            .filter(Membership::is_active)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "user '{user_id}' is not an active member of business '{business_id}'"
                ))
            })
    }
}

fn authority_of(context: &BusinessContext) -> ActorAuthority {
    if context.is_superadmin() {
        ActorAuthority::Superadmin
    } else if context.is_owner() {
        ActorAuthority::Owner
    } else {
        ActorAuthority::Member
    }
}

#[cfg(test)]
mod tests;
