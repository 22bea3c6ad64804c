use std::collections::BTreeSet;
use std::sync::Arc;

use ledgerguard_domain::{Permission, PermissionOverrides, Role, RolePermissionMap};

/// Computes the effective permission set of a membership.
///
/// Pure and lock-free; clones share the injected role table.
#[derive(Debug, Clone)]
pub struct EffectivePermissionResolver {
    role_permissions: Arc<RolePermissionMap>,
}

impl EffectivePermissionResolver {
    /// Creates a resolver over an injected role table.
    #[must_use]
    pub fn new(role_permissions: Arc<RolePermissionMap>) -> Self {
        Self { role_permissions }
    }

    /// Creates a resolver over the standard role table.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(Arc::new(RolePermissionMap::standard().clone()))
    }

    /// Returns the role table backing this resolver.
    #[must_use]
    pub fn role_permissions(&self) -> &RolePermissionMap {
        &self.role_permissions
    }

    /// Resolves role defaults plus overrides into the effective set.
    ///
    /// A role missing from the table resolves to the empty set before
    /// overrides are applied.
    #[must_use]
    pub fn resolve(
        &self,
        role: Role,
        overrides: Option<&PermissionOverrides>,
    ) -> BTreeSet<Permission> {
        let base = self.role_permissions.permissions_for(role);
        match overrides {
            Some(overrides) if !overrides.is_empty() => overrides.apply_to(base),
            _ => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ledgerguard_domain::{Permission, PermissionOverrides, Role, RolePermissionMap};

    use super::EffectivePermissionResolver;

    #[test]
    fn no_overrides_returns_role_defaults() {
        let resolver = EffectivePermissionResolver::standard();
        for role in Role::all() {
            assert_eq!(
                resolver.resolve(*role, None),
                RolePermissionMap::standard().permissions_for(*role)
            );
            assert_eq!(
                resolver.resolve(*role, Some(&PermissionOverrides::new())),
                RolePermissionMap::standard().permissions_for(*role)
            );
        }
    }

    #[test]
    fn viewer_defaults_match_the_read_only_contract() {
        let permissions = EffectivePermissionResolver::standard().resolve(Role::Viewer, None);

        for allowed in [
            Permission::InvoiceRead,
            Permission::PartyRead,
            Permission::InventoryRead,
            Permission::PaymentRead,
            Permission::ReportView,
        ] {
            assert!(permissions.contains(&allowed), "{allowed}");
        }
        assert!(!permissions.contains(&Permission::InvoiceDelete));
        assert!(!permissions.contains(&Permission::PartyDelete));
    }

    #[test]
    fn deny_override_removes_and_grant_override_adds() {
        let resolver = EffectivePermissionResolver::standard();
        let overrides = PermissionOverrides::new()
            .with(Permission::InvoiceUpdate, false)
            .with(Permission::InvoiceDelete, true);

        let permissions = resolver.resolve(Role::Employee, Some(&overrides));
        assert!(!permissions.contains(&Permission::InvoiceUpdate));
        assert!(permissions.contains(&Permission::InvoiceDelete));
        assert!(permissions.contains(&Permission::InvoiceCreate));
    }

    #[test]
    fn role_absent_from_injected_table_resolves_to_empty_set() {
        let resolver = EffectivePermissionResolver::new(Arc::new(RolePermissionMap::from_entries([
            (Role::Owner, vec![Permission::BusinessRead]),
        ])));

        assert!(resolver.resolve(Role::Accountant, None).is_empty());

        let overrides = PermissionOverrides::new().with(Permission::ReportView, false);
        assert!(resolver.resolve(Role::Accountant, Some(&overrides)).is_empty());
    }
}
