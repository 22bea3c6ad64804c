use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ledgerguard_application::{AuditLogPage, BusinessContext, ContextGrant, MembershipUpdate};
use ledgerguard_domain::{
    AuditRecord, Membership, Permission, PermissionCategoryGroup, PermissionDescriptor, Role,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// One permission in the catalog.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/permission-descriptor-response.ts"
)]
pub struct PermissionDescriptorResponse {
    pub key: String,
    pub label: String,
    pub description: String,
    pub default_roles: Vec<String>,
}

/// Permissions grouped under one category.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/permission-category-response.ts"
)]
pub struct PermissionCategoryResponse {
    pub category: String,
    pub label: String,
    pub permissions: Vec<PermissionDescriptorResponse>,
}

/// A role with its default permission set.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/role-response.ts"
)]
pub struct RoleResponse {
    pub role: String,
    pub label: String,
    pub assignable: bool,
    pub permissions: Vec<String>,
}

/// The caller's resolved authorization state in one business.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/business-context-response.ts"
)]
pub struct BusinessContextResponse {
    pub business_id: String,
    pub user_id: String,
    pub role: String,
    pub is_owner: bool,
    pub is_superadmin: bool,
    pub grant: String,
    pub permissions: Vec<String>,
}

/// API representation of a business membership.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/membership-response.ts"
)]
pub struct MembershipResponse {
    pub business_id: String,
    pub user_id: String,
    pub role: String,
    pub status: String,
    pub is_owner: bool,
    pub custom_permissions: Option<BTreeMap<String, bool>>,
    pub created_at: String,
    pub updated_at: String,
}

/// Membership after a change, with the audit record id written alongside it.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/membership-update-response.ts"
)]
pub struct MembershipUpdateResponse {
    pub membership: MembershipResponse,
    pub audit_id: String,
}

/// A member's resolved effective permissions.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/member-permissions-response.ts"
)]
pub struct MemberPermissionsResponse {
    pub user_id: String,
    pub permissions: Vec<String>,
}

/// Incoming payload for assigning an active member.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/assign-member-request.ts"
)]
pub struct AssignMemberRequest {
    pub user_id: String,
    pub role: String,
    #[serde(default)]
    pub custom_permissions: Option<BTreeMap<String, bool>>,
    #[serde(default)]
    pub is_owner: bool,
}

/// Incoming payload for inviting a member.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/invite-member-request.ts"
)]
pub struct InviteMemberRequest {
    pub user_id: String,
    pub role: String,
}

/// Incoming payload for a role change.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/update-role-request.ts"
)]
pub struct UpdateRoleRequest {
    pub role: String,
}

/// Incoming payload replacing the full override map; `null` clears it.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/update-permissions-request.ts"
)]
pub struct UpdatePermissionsRequest {
    pub custom_permissions: Option<BTreeMap<String, bool>>,
}

/// Query parameters for member listing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMembersQuery {
    pub include_removed: Option<bool>,
}

/// Query parameters for audit log listing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogQueryParams {
    pub action: Option<String>,
    pub user_id: Option<String>,
    pub target_user_id: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Override keys a `permission:update` record changed.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/permission-changes-response.ts"
)]
pub struct PermissionChangesResponse {
    pub restricted: Vec<String>,
    pub allowed: Vec<String>,
    pub reset: Vec<String>,
}

/// API representation of one audit record.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/audit-record-response.ts"
)]
pub struct AuditRecordResponse {
    pub id: String,
    pub business_id: String,
    pub actor_user_id: Option<String>,
    pub target_user_id: Option<String>,
    pub action: String,
    #[ts(type = "Record<string, unknown> | null")]
    pub old_value: Option<Value>,
    #[ts(type = "Record<string, unknown> | null")]
    pub new_value: Option<Value>,
    pub permission_changes: Option<PermissionChangesResponse>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

/// One page of audit records.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/audit-log-page-response.ts"
)]
pub struct AuditLogPageResponse {
    #[ts(type = "number")]
    pub total: u64,
    pub logs: Vec<AuditRecordResponse>,
}

fn permission_keys<'a>(permissions: impl IntoIterator<Item = &'a Permission>) -> Vec<String> {
    permissions
        .into_iter()
        .map(|permission| permission.as_str().to_owned())
        .collect()
}

impl From<PermissionDescriptor> for PermissionDescriptorResponse {
    fn from(value: PermissionDescriptor) -> Self {
        Self {
            key: value.key.to_owned(),
            label: value.label.to_owned(),
            description: value.description.to_owned(),
            default_roles: value
                .default_roles
                .into_iter()
                .map(|role| role.as_str().to_owned())
                .collect(),
        }
    }
}

impl From<PermissionCategoryGroup> for PermissionCategoryResponse {
    fn from(value: PermissionCategoryGroup) -> Self {
        Self {
            category: value.category.as_str().to_owned(),
            label: value.label.to_owned(),
            permissions: value
                .permissions
                .into_iter()
                .map(PermissionDescriptorResponse::from)
                .collect(),
        }
    }
}

impl RoleResponse {
    pub fn new(role: Role, permissions: &std::collections::BTreeSet<Permission>) -> Self {
        Self {
            role: role.as_str().to_owned(),
            label: role.label().to_owned(),
            assignable: role.is_assignable(),
            permissions: permission_keys(permissions),
        }
    }
}

impl From<&BusinessContext> for BusinessContextResponse {
    fn from(value: &BusinessContext) -> Self {
        Self {
            business_id: value.business_id().to_string(),
            user_id: value.user_id().to_string(),
            role: value.role().as_str().to_owned(),
            is_owner: value.is_owner(),
            is_superadmin: value.is_superadmin(),
            grant: match value.grant() {
                ContextGrant::Membership => "membership",
                ContextGrant::Superadmin => "superadmin",
                ContextGrant::LegacyOwnerFallback => "legacy_owner_fallback",
            }
            .to_owned(),
            permissions: permission_keys(value.permissions()),
        }
    }
}

impl From<Membership> for MembershipResponse {
    fn from(value: Membership) -> Self {
        Self {
            business_id: value.business_id().to_string(),
            user_id: value.user_id().to_string(),
            role: value.role().as_str().to_owned(),
            status: value.status().as_str().to_owned(),
            is_owner: value.is_owner(),
            custom_permissions: value.custom_permissions().map(|overrides| {
                overrides
                    .iter()
                    .map(|(key, allowed)| (key.to_owned(), allowed))
                    .collect()
            }),
            created_at: value.created_at().to_rfc3339(),
            updated_at: value.updated_at().to_rfc3339(),
        }
    }
}

impl From<MembershipUpdate> for MembershipUpdateResponse {
    fn from(value: MembershipUpdate) -> Self {
        Self {
            membership: MembershipResponse::from(value.membership),
            audit_id: value.audit_record.id.to_string(),
        }
    }
}

impl From<AuditRecord> for AuditRecordResponse {
    fn from(value: AuditRecord) -> Self {
        let permission_changes =
            value
                .permission_changes()
                .map(|changes| PermissionChangesResponse {
                    restricted: changes.restricted.into_iter().collect(),
                    allowed: changes.allowed.into_iter().collect(),
                    reset: changes.reset.into_iter().collect(),
                });

        Self {
            id: value.id.to_string(),
            business_id: value.business_id.to_string(),
            actor_user_id: value.actor_user_id.map(|actor| actor.to_string()),
            target_user_id: value.target_user_id.map(|target| target.to_string()),
            action: value.action.as_str().to_owned(),
            old_value: value.old_value,
            new_value: value.new_value,
            permission_changes,
            ip_address: value.ip_address,
            user_agent: value.user_agent,
            notes: value.notes,
            created_at: value.created_at.to_rfc3339(),
        }
    }
}

impl From<AuditLogPage> for AuditLogPageResponse {
    fn from(value: AuditLogPage) -> Self {
        Self {
            total: value.total,
            logs: value
                .logs
                .into_iter()
                .map(AuditRecordResponse::from)
                .collect(),
        }
    }
}
