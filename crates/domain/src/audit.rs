use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use ledgerguard_core::{AppError, AppResult, BusinessId, UserId};
use serde_json::Value;
use uuid::Uuid;

use crate::AuditAction;

/// Request attribution copied into audit records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    /// Client IP address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
}

/// Audit event payload before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Business scope.
    pub business_id: BusinessId,
    /// Caller who performed the change; `None` means system.
    pub actor_user_id: Option<UserId>,
    /// Member affected by the change.
    pub target_user_id: Option<UserId>,
    /// Stable action identifier.
    pub action: AuditAction,
    /// State before the change.
    pub old_value: Option<Value>,
    /// State after the change.
    pub new_value: Option<Value>,
    /// Client IP address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Optional free-form note.
    pub notes: Option<String>,
}

impl AuditEvent {
    /// Checks fields every membership audit event must carry.
    pub fn validate(&self) -> AppResult<()> {
        if self.target_user_id.is_none() {
            return Err(AppError::Validation(format!(
                "audit action '{}' requires a target user",
                self.action
            )));
        }

        Ok(())
    }

    /// Stamps the event with its identity and timestamp.
    #[must_use]
    pub fn into_record(self, id: Uuid, created_at: DateTime<Utc>) -> AuditRecord {
        AuditRecord {
            id,
            business_id: self.business_id,
            actor_user_id: self.actor_user_id,
            target_user_id: self.target_user_id,
            action: self.action,
            old_value: self.old_value,
            new_value: self.new_value,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            notes: self.notes,
            created_at,
        }
    }
}

/// Immutable persisted audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// Stable record id.
    pub id: Uuid,
    /// Business scope.
    pub business_id: BusinessId,
    /// Caller who performed the change; `None` means system.
    pub actor_user_id: Option<UserId>,
    /// Member affected by the change.
    pub target_user_id: Option<UserId>,
    /// Stable action identifier.
    pub action: AuditAction,
    /// State before the change.
    pub old_value: Option<Value>,
    /// State after the change.
    pub new_value: Option<Value>,
    /// Client IP address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Optional free-form note.
    pub notes: Option<String>,
    /// Persistence timestamp.
    pub created_at: DateTime<Utc>,
}

/// Override keys that changed between two `permission:update` payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionChanges {
    /// Keys newly overridden to `false`.
    pub restricted: BTreeSet<String>,
    /// Keys newly overridden to `true`.
    pub allowed: BTreeSet<String>,
    /// Keys whose override was dropped, falling back to the role default.
    pub reset: BTreeSet<String>,
}

impl AuditRecord {
    /// Derives what a `permission:update` record changed.
    ///
    /// Returns `None` for other actions.
    #[must_use]
    pub fn permission_changes(&self) -> Option<PermissionChanges> {
        if self.action != AuditAction::PermissionUpdate {
            return None;
        }

        let old = override_entries(self.old_value.as_ref());
        let new = override_entries(self.new_value.as_ref());
        let mut changes = PermissionChanges::default();

        for (key, allowed) in &new {
            if old.get(key) == Some(allowed) {
                continue;
            }

            if *allowed {
                changes.allowed.insert(key.clone());
            } else {
                changes.restricted.insert(key.clone());
            }
        }

        for key in old.keys() {
            if !new.contains_key(key) {
                changes.reset.insert(key.clone());
            }
        }

        Some(changes)
    }
}

fn override_entries(payload: Option<&Value>) -> std::collections::BTreeMap<String, bool> {
    payload
        .and_then(|value| value.get("permissions"))
        .and_then(Value::as_object)
        .map(|object| {
            object
                .iter()
                .filter_map(|(key, value)| value.as_bool().map(|allowed| (key.clone(), allowed)))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use ledgerguard_core::{BusinessId, UserId};
    use serde_json::json;
    use uuid::Uuid;

    use super::{AuditEvent, RequestMetadata};
    use crate::AuditAction;

    fn event(action: AuditAction, old_value: serde_json::Value, new_value: serde_json::Value) -> AuditEvent {
        AuditEvent {
            business_id: BusinessId::new(),
            actor_user_id: None,
            target_user_id: UserId::new("bob").ok(),
            action,
            old_value: Some(old_value),
            new_value: Some(new_value),
            ip_address: RequestMetadata::default().ip_address,
            user_agent: None,
            notes: None,
        }
    }

    #[test]
    fn permission_changes_are_derived_by_set_difference() {
        let record = event(
            AuditAction::PermissionUpdate,
            json!({ "permissions": { "invoice:delete": true, "party:read": false } }),
            json!({ "permissions": { "invoice:delete": false, "payment:refund": true } }),
        )
        .into_record(Uuid::new_v4(), Utc::now());

        let Some(changes) = record.permission_changes() else {
            panic!("expected permission changes");
        };
        assert!(changes.restricted.contains("invoice:delete"));
        assert!(changes.allowed.contains("payment:refund"));
        assert!(changes.reset.contains("party:read"));
    }

    #[test]
    fn unchanged_overrides_are_not_reported() {
        let record = event(
            AuditAction::PermissionUpdate,
            json!({ "permissions": { "invoice:delete": true } }),
            json!({ "permissions": { "invoice:delete": true } }),
        )
        .into_record(Uuid::new_v4(), Utc::now());

        assert_eq!(record.permission_changes(), Some(Default::default()));
    }

    #[test]
    fn role_updates_have_no_permission_changes() {
        let record = event(
            AuditAction::RoleUpdate,
            json!({ "role": "viewer" }),
            json!({ "role": "admin" }),
        )
        .into_record(Uuid::new_v4(), Utc::now());

        assert!(record.permission_changes().is_none());
    }

    #[test]
    fn system_events_still_need_a_target() {
        let mut system_event = event(AuditAction::UserRemove, json!({}), json!({}));
        assert!(system_event.validate().is_ok());

        system_event.target_user_id = None;
        assert!(system_event.validate().is_err());
    }
}
