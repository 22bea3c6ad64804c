use ledgerguard_application::{AuditLogQuery, AuditLogRepository, MembershipRepository};
use ledgerguard_core::{AppError, BusinessId, UserId};
use ledgerguard_domain::{
    ActorAuthority, AuditAction, MembershipChange, MembershipMutation, Permission,
    PermissionOverrides, RequestMetadata, Role,
};
use serde_json::json;

use super::InMemoryAuthorizationStore;

fn user(value: &str) -> UserId {
    UserId::new(value).unwrap_or_else(|_| unreachable!())
}

fn change(business_id: BusinessId, user_id: &str, mutation: MembershipMutation) -> MembershipChange {
    MembershipChange {
        business_id,
        user_id: user(user_id),
        mutation,
        actor_user_id: Some(user("owner")),
        authority: ActorAuthority::Owner,
        metadata: RequestMetadata::default(),
        notes: None,
    }
}

fn assign(role: Role) -> MembershipMutation {
    MembershipMutation::Assign {
        role,
        custom_permissions: None,
        is_owner: false,
    }
}

#[tokio::test]
async fn apply_change_persists_membership_and_record() {
    let store = InMemoryAuthorizationStore::new();
    let business_id = BusinessId::new();

    let applied = store
        .apply_change(change(business_id, "bob", assign(Role::Viewer)))
        .await;
    assert!(applied.is_ok());

    let found = store.find_membership(business_id, &user("bob")).await;
    assert!(matches!(found, Ok(Some(ref membership)) if membership.role() == Role::Viewer));

    let page = store
        .list_entries(business_id, AuditLogQuery::default())
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(page.total, 1);
    assert_eq!(page.logs[0].action, AuditAction::UserAssign);
}

#[tokio::test]
async fn failed_audit_write_rolls_back_the_membership_change() {
    let store = InMemoryAuthorizationStore::new();
    let business_id = BusinessId::new();
    let seeded = store
        .apply_change(change(business_id, "bob", assign(Role::Employee)))
        .await;
    assert!(seeded.is_ok());

    store.fail_next_audit_write();
    let result = store
        .apply_change(change(
            business_id,
            "bob",
            MembershipMutation::UpdatePermissions {
                custom_permissions: Some(
                    PermissionOverrides::new().with(Permission::InvoiceDelete, true),
                ),
            },
        ))
        .await;
    assert!(matches!(result, Err(AppError::Internal(_))));

    let membership = store
        .find_membership(business_id, &user("bob"))
        .await
        .unwrap_or_else(|_| unreachable!())
        .unwrap_or_else(|| unreachable!());
    assert_eq!(membership.custom_permissions(), None);

    let page = store
        .list_entries(business_id, AuditLogQuery::default())
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(page.total, 1);
    assert!(
        page.logs
            .iter()
            .all(|record| record.action != AuditAction::PermissionUpdate)
    );
}

#[tokio::test]
async fn failed_audit_write_on_first_assign_leaves_no_row() {
    let store = InMemoryAuthorizationStore::new();
    let business_id = BusinessId::new();

    store.fail_next_audit_write();
    let result = store
        .apply_change(change(business_id, "bob", assign(Role::Viewer)))
        .await;
    assert!(result.is_err());

    let found = store.find_membership(business_id, &user("bob")).await;
    assert!(matches!(found, Ok(None)));
}

#[tokio::test]
async fn permission_update_records_full_maps() {
    let store = InMemoryAuthorizationStore::new();
    let business_id = BusinessId::new();
    let _ = store
        .apply_change(change(business_id, "bob", assign(Role::Employee)))
        .await;

    let first = PermissionOverrides::new()
        .with(Permission::InvoiceUpdate, false)
        .with(Permission::PartyCreate, true);
    let _ = store
        .apply_change(change(
            business_id,
            "bob",
            MembershipMutation::UpdatePermissions {
                custom_permissions: Some(first),
            },
        ))
        .await;

    let second = PermissionOverrides::new().with(Permission::PartyCreate, true);
    let (_, record) = store
        .apply_change(change(
            business_id,
            "bob",
            MembershipMutation::UpdatePermissions {
                custom_permissions: Some(second),
            },
        ))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        record.old_value,
        Some(json!({ "permissions": { "invoice:update": false, "party:create": true } }))
    );
    assert_eq!(
        record.new_value,
        Some(json!({ "permissions": { "party:create": true } }))
    );
    let changes = record.permission_changes().unwrap_or_default();
    assert!(changes.reset.contains("invoice:update"));
    assert!(changes.allowed.is_empty());
}

#[tokio::test]
async fn list_memberships_is_scoped_and_sorted() {
    let store = InMemoryAuthorizationStore::new();
    let business_id = BusinessId::new();
    for name in ["carol", "alice", "bob"] {
        let _ = store
            .apply_change(change(business_id, name, assign(Role::Viewer)))
            .await;
    }
    let _ = store
        .apply_change(change(BusinessId::new(), "dave", assign(Role::Viewer)))
        .await;
    let _ = store
        .apply_change(change(business_id, "bob", MembershipMutation::Remove))
        .await;

    let active = store
        .list_memberships(business_id, false)
        .await
        .unwrap_or_default();
    let names: Vec<&str> = active.iter().map(|member| member.user_id().as_str()).collect();
    assert_eq!(names, vec!["alice", "carol"]);

    let all = store
        .list_memberships(business_id, true)
        .await
        .unwrap_or_default();
    assert_eq!(all.len(), 3);
}
