use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::LazyLock;

use ledgerguard_core::AppError;
use serde::{Deserialize, Serialize};

use crate::Permission;

/// Roles a user can hold inside one business.
///
/// The set is flat: no role inherits from another. `Superadmin` is a
/// platform-wide flag on the identity and is never stored on a membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform operator, bypasses every check.
    Superadmin,
    /// Business owner.
    Owner,
    /// Business administrator.
    Admin,
    /// General staff.
    Employee,
    /// Bookkeeping and finance staff.
    Accountant,
    /// Sales staff.
    Salesman,
    /// Read-only access.
    Viewer,
}

impl Role {
    /// Returns a stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Superadmin => "superadmin",
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Employee => "employee",
            Self::Accountant => "accountant",
            Self::Salesman => "salesman",
            Self::Viewer => "viewer",
        }
    }

    /// Returns all roles.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Role] = &[
            Role::Superadmin,
            Role::Owner,
            Role::Admin,
            Role::Employee,
            Role::Accountant,
            Role::Salesman,
            Role::Viewer,
        ];

        ALL
    }

    /// Returns whether the role may be stored on a business membership.
    #[must_use]
    pub fn is_assignable(&self) -> bool {
        !matches!(self, Self::Superadmin)
    }

    /// Returns a display label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Superadmin => "Super admin",
            Self::Owner => "Owner",
            Self::Admin => "Admin",
            Self::Employee => "Employee",
            Self::Accountant => "Accountant",
            Self::Salesman => "Salesman",
            Self::Viewer => "Viewer",
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "superadmin" => Ok(Self::Superadmin),
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "employee" => Ok(Self::Employee),
            "accountant" => Ok(Self::Accountant),
            "salesman" => Ok(Self::Salesman),
            "viewer" => Ok(Self::Viewer),
            _ => Err(AppError::Validation(format!("unknown role value '{value}'"))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

static STANDARD_ROLE_PERMISSIONS: LazyLock<RolePermissionMap> =
    LazyLock::new(RolePermissionMap::build_standard);

/// Immutable mapping from role to its default permission set.
///
/// Lookups are total: a role without an entry yields the empty set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RolePermissionMap {
    entries: BTreeMap<Role, BTreeSet<Permission>>,
}

impl RolePermissionMap {
    /// Returns the process-wide default table.
    #[must_use]
    pub fn standard() -> &'static Self {
        &STANDARD_ROLE_PERMISSIONS
    }

    /// Builds a table from explicit entries. Later entries for the same role
    /// are merged into earlier ones.
    #[must_use]
    pub fn from_entries<I, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Role, P)>,
        P: IntoIterator<Item = Permission>,
    {
        let mut map: BTreeMap<Role, BTreeSet<Permission>> = BTreeMap::new();
        for (role, permissions) in entries {
            map.entry(role).or_default().extend(permissions);
        }

        Self { entries: map }
    }

    /// Returns the default permissions for a role.
    #[must_use]
    pub fn permissions_for(&self, role: Role) -> BTreeSet<Permission> {
        self.entries.get(&role).cloned().unwrap_or_default()
    }

    /// Returns whether the role grants a permission by default.
    #[must_use]
    pub fn grants(&self, role: Role, permission: Permission) -> bool {
        self.entries
            .get(&role)
            .is_some_and(|permissions| permissions.contains(&permission))
    }

    /// Returns roles that grant the permission by default, in role order.
    #[must_use]
    pub fn roles_granting(&self, permission: Permission) -> Vec<Role> {
        self.entries
            .iter()
            .filter_map(|(role, permissions)| permissions.contains(&permission).then_some(*role))
            .collect()
    }

    fn build_standard() -> Self {
        use Permission::*;

        let everything = Permission::all().iter().copied();
        let admin = Permission::all()
            .iter()
            .copied()
            .filter(|permission| *permission != BusinessDelete);

        Self::from_entries([
            (Role::Superadmin, everything.clone().collect::<Vec<_>>()),
            (Role::Owner, everything.collect()),
            (Role::Admin, admin.collect()),
            (
                Role::Employee,
                vec![
                    BusinessRead,
                    InvoiceCreate,
                    InvoiceRead,
                    InvoiceUpdate,
                    InvoiceExport,
                    PartyRead,
                    InventoryRead,
                    PaymentRead,
                ],
            ),
            (
                Role::Accountant,
                vec![
                    BusinessRead,
                    InvoiceRead,
                    InvoiceExport,
                    PartyRead,
                    InventoryRead,
                    PaymentCreate,
                    PaymentRead,
                    PaymentUpdate,
                    PaymentRefund,
                    ReportView,
                    ReportExport,
                    ReportFinancial,
                ],
            ),
            (
                Role::Salesman,
                vec![
                    BusinessRead,
                    InvoiceCreate,
                    InvoiceRead,
                    PartyCreate,
                    PartyRead,
                    PartyUpdate,
                    InventoryRead,
                    PaymentCreate,
                    PaymentRead,
                ],
            ),
            (
                Role::Viewer,
                vec![
                    BusinessRead,
                    InvoiceRead,
                    PartyRead,
                    InventoryRead,
                    PaymentRead,
                    ReportView,
                ],
            ),
        ])
    }
}
