use crate::{Permission, PermissionCategory, Role, RolePermissionMap};

/// Display metadata for one permission.
///
/// Catalog entries are informational only; enforcement always reads the
/// [`RolePermissionMap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDescriptor {
    /// The permission itself.
    pub permission: Permission,
    /// Stable `resource:action` key.
    pub key: &'static str,
    /// Short label.
    pub label: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Roles granting the permission by default, superadmin excluded.
    pub default_roles: Vec<Role>,
}

/// Permissions of one category in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionCategoryGroup {
    /// Category identifier.
    pub category: PermissionCategory,
    /// Category label.
    pub label: &'static str,
    /// Permissions in the category.
    pub permissions: Vec<PermissionDescriptor>,
}

/// Builds the grouped permission catalog for UI rendering.
#[must_use]
pub fn permission_catalog(role_permissions: &RolePermissionMap) -> Vec<PermissionCategoryGroup> {
    PermissionCategory::all()
        .iter()
        .map(|category| PermissionCategoryGroup {
            category: *category,
            label: category.label(),
            permissions: Permission::all()
                .iter()
                .filter(|permission| permission.category() == *category)
                .map(|permission| PermissionDescriptor {
                    permission: *permission,
                    key: permission.as_str(),
                    label: permission.label(),
                    description: permission.description(),
                    default_roles: role_permissions
                        .roles_granting(*permission)
                        .into_iter()
                        .filter(Role::is_assignable)
                        .collect(),
                })
                .collect(),
        })
        .collect()
}
