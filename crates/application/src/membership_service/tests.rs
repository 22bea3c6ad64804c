use std::sync::Arc;

use ledgerguard_core::{AppError, BusinessId, Identity};
use ledgerguard_domain::{
    AuditAction, MembershipStatus, Permission, PermissionOverrides, Role, RolePermissionMap,
};
use serde_json::json;

use crate::test_support::{FakeAuthorizationStore, metadata, user};
use crate::{
    AccessGuard, AuditRecorder, AuthorizationEnforcer, BusinessContext, BusinessContextResolver,
    EffectivePermissionResolver, MissingMembershipPolicy, Operation,
};

use super::{AssignMemberInput, MembershipService};

struct Harness {
    store: Arc<FakeAuthorizationStore>,
    service: MembershipService,
    guard: AccessGuard,
    business_id: BusinessId,
}

impl Harness {
    async fn new(policy: MissingMembershipPolicy) -> Self {
        let store = Arc::new(FakeAuthorizationStore::default());
        let enforcer = Arc::new(AuthorizationEnforcer::new());
        let permissions = EffectivePermissionResolver::standard();
        let service = MembershipService::new(
            store.clone(),
            AuditRecorder::new(store.clone(), store.clone()),
            permissions.clone(),
            enforcer.clone(),
        );
        let guard = AccessGuard::new(
            BusinessContextResolver::new(store.clone(), permissions, policy),
            enforcer,
        );
        let business_id = BusinessId::new();

        let Ok(_) = service
            .register_owner(business_id, user("owner"), metadata())
            .await
        else {
            panic!("owner registration should succeed");
        };

        Self {
            store,
            service,
            guard,
            business_id,
        }
    }

    async fn context(&self, identity: &Identity) -> BusinessContext {
        let Ok(context) = self
            .guard
            .authorize_for(identity, self.business_id, &crate::operations::VIEW_CONTEXT)
            .await
        else {
            panic!("context should resolve for {}", identity.user_id());
        };
        context
    }

    async fn owner(&self) -> BusinessContext {
        self.context(&Identity::user(user("owner"))).await
    }

    async fn assign(&self, name: &str, role: Role) {
        let owner = self.owner().await;
        let input = AssignMemberInput {
            user_id: user(name),
            role,
            custom_permissions: None,
            is_owner: false,
        };
        let Ok(_) = self.service.assign_member(&owner, input, metadata()).await else {
            panic!("owner should assign {name}");
        };
    }
}

#[tokio::test]
async fn register_owner_is_attributed_to_system() {
    let harness = Harness::new(MissingMembershipPolicy::Deny).await;
    let records = harness.store.records().await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, AuditAction::UserAssign);
    assert_eq!(records[0].actor_user_id, None);

    let owner = harness.owner().await;
    assert!(owner.is_owner());
    assert_eq!(owner.role(), Role::Owner);
}

#[tokio::test]
async fn employee_scenario_grants_delete_through_override() {
    let harness = Harness::new(MissingMembershipPolicy::Deny).await;
    harness.assign("u", Role::Employee).await;
    let identity = Identity::user(user("u"));
    let delete_invoice = Operation::requires("delete_invoice", Permission::InvoiceDelete);

    let context = harness.context(&identity).await;
    for expected in [
        Permission::InvoiceCreate,
        Permission::InvoiceRead,
        Permission::InvoiceUpdate,
        Permission::InvoiceExport,
        Permission::PartyRead,
        Permission::InventoryRead,
        Permission::PaymentRead,
    ] {
        assert!(context.permissions().contains(&expected), "{expected}");
    }
    assert!(!context.permissions().contains(&Permission::InvoiceDelete));
    assert!(matches!(
        harness
            .guard
            .authorize_for(&identity, harness.business_id, &delete_invoice)
            .await,
        Err(AppError::Forbidden(_))
    ));

    let owner = harness.owner().await;
    let Ok(update) = harness
        .service
        .update_permissions(
            &owner,
            user("u"),
            Some(PermissionOverrides::new().with(Permission::InvoiceDelete, true)),
            metadata(),
        )
        .await
    else {
        panic!("owner should update permissions");
    };

    assert!(
        harness
            .guard
            .authorize_for(&identity, harness.business_id, &delete_invoice)
            .await
            .is_ok()
    );

    let permission_records: Vec<_> = harness
        .store
        .records()
        .await
        .into_iter()
        .filter(|record| record.action == AuditAction::PermissionUpdate)
        .collect();
    assert_eq!(permission_records, vec![update.audit_record.clone()]);
    assert_eq!(
        update.audit_record.old_value,
        Some(json!({ "permissions": {} }))
    );
    assert_eq!(
        update.audit_record.new_value,
        Some(json!({ "permissions": { "invoice:delete": true } }))
    );
    assert_eq!(update.audit_record.actor_user_id, Some(user("owner")));
    assert_eq!(update.audit_record.target_user_id, Some(user("u")));
}

#[tokio::test]
async fn role_update_records_previous_and_next_role() {
    let harness = Harness::new(MissingMembershipPolicy::Deny).await;
    harness.assign("bob", Role::Viewer).await;
    let owner = harness.owner().await;

    let Ok(update) = harness
        .service
        .update_role(&owner, user("bob"), Role::Accountant, metadata())
        .await
    else {
        panic!("owner should update role");
    };

    assert_eq!(update.membership.role(), Role::Accountant);
    assert_eq!(update.audit_record.action, AuditAction::RoleUpdate);
    assert_eq!(update.audit_record.old_value, Some(json!({ "role": "viewer" })));
    assert_eq!(
        update.audit_record.new_value,
        Some(json!({ "role": "accountant" }))
    );

    let bob = harness.context(&Identity::user(user("bob"))).await;
    assert!(bob.permissions().contains(&Permission::PaymentRefund));
}

#[tokio::test]
async fn member_without_permission_cannot_administer() {
    let harness = Harness::new(MissingMembershipPolicy::Deny).await;
    harness.assign("eve", Role::Employee).await;
    harness.assign("bob", Role::Viewer).await;
    let eve = harness.context(&Identity::user(user("eve"))).await;
    let before = harness.store.records().await.len();

    let result = harness
        .service
        .update_role(&eve, user("bob"), Role::Admin, metadata())
        .await;

    let Err(AppError::Forbidden(message)) = result else {
        panic!("employee must not update roles");
    };
    assert_eq!(message, "missing permission 'user:update_role'");
    assert_eq!(harness.store.records().await.len(), before);
}

#[tokio::test]
async fn superadmin_role_is_not_assignable() {
    let harness = Harness::new(MissingMembershipPolicy::Deny).await;
    harness.assign("bob", Role::Viewer).await;
    let owner = harness.owner().await;

    let result = harness
        .service
        .update_role(&owner, user("bob"), Role::Superadmin, metadata())
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let result = harness
        .service
        .invite_member(&owner, user("carol"), Role::Superadmin, metadata())
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn owner_membership_is_protected_from_admins() {
    let harness = Harness::new(MissingMembershipPolicy::Deny).await;
    harness.assign("admin", Role::Admin).await;
    let admin = harness.context(&Identity::user(user("admin"))).await;

    let result = harness
        .service
        .remove_member(&admin, user("owner"), metadata())
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let root = harness.context(&Identity::superadmin(user("root"))).await;
    let result = harness
        .service
        .update_role(&root, user("owner"), Role::Admin, metadata())
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn only_superadmin_assigns_ownership() {
    let harness = Harness::new(MissingMembershipPolicy::Deny).await;
    let owner = harness.owner().await;
    let input = AssignMemberInput {
        user_id: user("heir"),
        role: Role::Owner,
        custom_permissions: None,
        is_owner: true,
    };

    let result = harness
        .service
        .assign_member(&owner, input.clone(), metadata())
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let root = harness.context(&Identity::superadmin(user("root"))).await;
    let Ok(update) = harness.service.assign_member(&root, input, metadata()).await else {
        panic!("superadmin should assign ownership");
    };
    assert!(update.membership.is_owner());
}

#[tokio::test]
async fn admin_cannot_promote_themselves_to_owner_role() {
    let harness = Harness::new(MissingMembershipPolicy::Deny).await;
    harness.assign("adam", Role::Admin).await;
    let identity = Identity::user(user("adam"));
    let admin = harness.context(&identity).await;
    assert!(!admin.permissions().contains(&Permission::BusinessDelete));
    let before = harness.store.records().await.len();

    let result = harness
        .service
        .update_role(&admin, user("adam"), Role::Owner, metadata())
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let result = harness
        .service
        .update_permissions(
            &admin,
            user("adam"),
            Some(PermissionOverrides::new().with(Permission::BusinessDelete, true)),
            metadata(),
        )
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let after = harness.context(&identity).await;
    assert_eq!(after.role(), Role::Admin);
    assert!(!after.permissions().contains(&Permission::BusinessDelete));
    assert_eq!(harness.store.records().await.len(), before);
}

#[tokio::test]
async fn owner_role_is_granted_only_by_owner_or_superadmin() {
    let harness = Harness::new(MissingMembershipPolicy::Deny).await;
    harness.assign("adam", Role::Admin).await;
    harness.assign("bob", Role::Viewer).await;
    let admin = harness.context(&Identity::user(user("adam"))).await;

    let result = harness
        .service
        .update_role(&admin, user("bob"), Role::Owner, metadata())
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let result = harness
        .service
        .invite_member(&admin, user("carol"), Role::Owner, metadata())
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let owner = harness.owner().await;
    let Ok(update) = harness
        .service
        .update_role(&owner, user("bob"), Role::Owner, metadata())
        .await
    else {
        panic!("owner should grant the owner role");
    };
    assert_eq!(update.membership.role(), Role::Owner);
    assert!(!update.membership.is_owner());
}

#[tokio::test]
async fn owner_keeps_access_despite_deny_override() {
    let harness = Harness::new(MissingMembershipPolicy::Deny).await;
    let root = harness.context(&Identity::superadmin(user("root"))).await;
    let Ok(_) = harness
        .service
        .update_permissions(
            &root,
            user("owner"),
            Some(PermissionOverrides::new().with(Permission::BusinessDelete, false)),
            metadata(),
        )
        .await
    else {
        panic!("superadmin should update owner overrides");
    };

    let delete_business = Operation::requires("delete_business", Permission::BusinessDelete);
    let result = harness
        .guard
        .authorize_for(
            &Identity::user(user("owner")),
            harness.business_id,
            &delete_business,
        )
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn unknown_override_keys_are_rejected_on_write() {
    let harness = Harness::new(MissingMembershipPolicy::Deny).await;
    harness.assign("bob", Role::Viewer).await;
    let owner = harness.owner().await;
    let mut overrides = PermissionOverrides::new();
    overrides.insert("invoice:teleport", true);

    let result = harness
        .service
        .update_permissions(&owner, user("bob"), Some(overrides), metadata())
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn invitation_flow_activates_membership() {
    let harness = Harness::new(MissingMembershipPolicy::Deny).await;
    let owner = harness.owner().await;
    let carol = Identity::user(user("carol"));

    let Ok(invite) = harness
        .service
        .invite_member(&owner, user("carol"), Role::Salesman, metadata())
        .await
    else {
        panic!("owner should invite");
    };
    assert_eq!(invite.membership.status(), MembershipStatus::Invited);
    assert_eq!(invite.audit_record.action, AuditAction::UserInvite);

    let pending = harness
        .guard
        .authorize_for(&carol, harness.business_id, &crate::operations::VIEW_CONTEXT)
        .await;
    assert!(matches!(pending, Err(AppError::Forbidden(_))));

    let Ok(accepted) = harness
        .service
        .accept_invitation(&carol, harness.business_id, metadata())
        .await
    else {
        panic!("invitee should accept");
    };
    assert_eq!(accepted.audit_record.actor_user_id, Some(user("carol")));
    assert_eq!(accepted.audit_record.action, AuditAction::UserAssign);

    let context = harness.context(&carol).await;
    assert_eq!(context.role(), Role::Salesman);

    let again = harness
        .service
        .accept_invitation(&carol, harness.business_id, metadata())
        .await;
    assert!(matches!(again, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn removal_revokes_access_and_lists_exclude_removed() {
    let harness = Harness::new(MissingMembershipPolicy::Deny).await;
    harness.assign("bob", Role::Accountant).await;
    let owner = harness.owner().await;

    let Ok(removed) = harness
        .service
        .remove_member(&owner, user("bob"), metadata())
        .await
    else {
        panic!("owner should remove bob");
    };
    assert_eq!(removed.membership.status(), MembershipStatus::Removed);

    let bob = harness
        .guard
        .authorize_for(
            &Identity::user(user("bob")),
            harness.business_id,
            &crate::operations::VIEW_CONTEXT,
        )
        .await;
    assert!(matches!(bob, Err(AppError::Forbidden(_))));

    let Ok(active) = harness.service.list_members(&owner, false).await else {
        panic!("owner should list members");
    };
    assert_eq!(active.len(), 1);
    let Ok(all) = harness.service.list_members(&owner, true).await else {
        panic!("owner should list members");
    };
    assert_eq!(all.len(), 2);

    let again = harness
        .service
        .remove_member(&owner, user("bob"), metadata())
        .await;
    assert!(matches!(again, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn grant_owner_policy_applies_to_removed_members() {
    let harness = Harness::new(MissingMembershipPolicy::GrantOwner).await;
    harness.assign("bob", Role::Viewer).await;
    let owner = harness.owner().await;
    let Ok(_) = harness
        .service
        .remove_member(&owner, user("bob"), metadata())
        .await
    else {
        panic!("owner should remove bob");
    };

    let bob = harness.context(&Identity::user(user("bob"))).await;
    assert_eq!(
        bob.permissions(),
        &RolePermissionMap::standard().permissions_for(Role::Owner)
    );
    assert!(!bob.is_owner());
}

#[tokio::test]
async fn effective_permissions_for_reports_member_set() {
    let harness = Harness::new(MissingMembershipPolicy::Deny).await;
    harness.assign("bob", Role::Viewer).await;
    let owner = harness.owner().await;

    let Ok(permissions) = harness
        .service
        .effective_permissions_for(&owner, &user("bob"))
        .await
    else {
        panic!("owner should read member permissions");
    };
    assert_eq!(
        permissions,
        RolePermissionMap::standard().permissions_for(Role::Viewer)
    );

    let missing = harness
        .service
        .effective_permissions_for(&owner, &user("nobody"))
        .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}
