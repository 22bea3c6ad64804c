use std::str::FromStr;

use ledgerguard_core::AppError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Permission categories used to group the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionCategory {
    /// Business profile and settings.
    Business,
    /// Business members and their access.
    User,
    /// Sales invoices.
    Invoice,
    /// Customers and suppliers.
    Party,
    /// Items and stock.
    Inventory,
    /// Payments received and made.
    Payment,
    /// Reports and dashboards.
    Report,
    /// Authorization audit trail.
    Audit,
}

impl PermissionCategory {
    /// Returns the categories in catalog order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[PermissionCategory] = &[
            PermissionCategory::Business,
            PermissionCategory::User,
            PermissionCategory::Invoice,
            PermissionCategory::Party,
            PermissionCategory::Inventory,
            PermissionCategory::Payment,
            PermissionCategory::Report,
            PermissionCategory::Audit,
        ];

        ALL
    }

    /// Returns the resource prefix shared by the category permissions.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Business => "business",
            Self::User => "user",
            Self::Invoice => "invoice",
            Self::Party => "party",
            Self::Inventory => "inventory",
            Self::Payment => "payment",
            Self::Report => "report",
            Self::Audit => "audit",
        }
    }

    /// Returns a display label for UI rendering.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Business => "Business",
            Self::User => "Team members",
            Self::Invoice => "Invoices",
            Self::Party => "Parties",
            Self::Inventory => "Inventory",
            Self::Payment => "Payments",
            Self::Report => "Reports",
            Self::Audit => "Audit log",
        }
    }
}

/// Permissions enforced on business-scoped operations.
///
/// Every value is a `resource:action` pair; the string form is the stable
/// storage and transport value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Permission {
    /// View the business profile.
    BusinessRead,
    /// Edit the business profile.
    BusinessUpdate,
    /// Change business settings (tax, numbering, preferences).
    BusinessSettings,
    /// Delete the business.
    BusinessDelete,
    /// List members of the business.
    UserRead,
    /// Invite or assign members.
    UserInvite,
    /// Change a member's role.
    UserUpdateRole,
    /// Change a member's custom permission overrides.
    UserUpdatePermissions,
    /// Remove members.
    UserRemove,
    /// Create invoices.
    InvoiceCreate,
    /// View invoices.
    InvoiceRead,
    /// Edit invoices.
    InvoiceUpdate,
    /// Delete invoices.
    InvoiceDelete,
    /// Export or download invoices.
    InvoiceExport,
    /// Cancel issued invoices.
    InvoiceCancel,
    /// Create parties.
    PartyCreate,
    /// View parties.
    PartyRead,
    /// Edit parties.
    PartyUpdate,
    /// Delete parties.
    PartyDelete,
    /// Create inventory items.
    InventoryCreate,
    /// View inventory items and stock.
    InventoryRead,
    /// Edit inventory items.
    InventoryUpdate,
    /// Delete inventory items.
    InventoryDelete,
    /// Post manual stock adjustments.
    InventoryAdjustStock,
    /// Record payments.
    PaymentCreate,
    /// View payments.
    PaymentRead,
    /// Edit payments.
    PaymentUpdate,
    /// Delete payments.
    PaymentDelete,
    /// Issue refunds.
    PaymentRefund,
    /// View operational reports.
    ReportView,
    /// Export reports.
    ReportExport,
    /// View financial statements and tax reports.
    ReportFinancial,
    /// Read the authorization audit log.
    AuditView,
    /// Export the authorization audit log.
    AuditExport,
}

impl Permission {
    /// Returns a stable storage value for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BusinessRead => "business:read",
            Self::BusinessUpdate => "business:update",
            Self::BusinessSettings => "business:settings",
            Self::BusinessDelete => "business:delete",
            Self::UserRead => "user:read",
            Self::UserInvite => "user:invite",
            Self::UserUpdateRole => "user:update_role",
            Self::UserUpdatePermissions => "user:update_permissions",
            Self::UserRemove => "user:remove",
            Self::InvoiceCreate => "invoice:create",
            Self::InvoiceRead => "invoice:read",
            Self::InvoiceUpdate => "invoice:update",
            Self::InvoiceDelete => "invoice:delete",
            Self::InvoiceExport => "invoice:export",
            Self::InvoiceCancel => "invoice:cancel",
            Self::PartyCreate => "party:create",
            Self::PartyRead => "party:read",
            Self::PartyUpdate => "party:update",
            Self::PartyDelete => "party:delete",
            Self::InventoryCreate => "inventory:create",
            Self::InventoryRead => "inventory:read",
            Self::InventoryUpdate => "inventory:update",
            Self::InventoryDelete => "inventory:delete",
            Self::InventoryAdjustStock => "inventory:adjust_stock",
            Self::PaymentCreate => "payment:create",
            Self::PaymentRead => "payment:read",
            Self::PaymentUpdate => "payment:update",
            Self::PaymentDelete => "payment:delete",
            Self::PaymentRefund => "payment:refund",
            Self::ReportView => "report:view",
            Self::ReportExport => "report:export",
            Self::ReportFinancial => "report:financial",
            Self::AuditView => "audit:view",
            Self::AuditExport => "audit:export",
        }
    }

    /// Returns all known permissions in catalog order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Permission] = &[
            Permission::BusinessRead,
            Permission::BusinessUpdate,
            Permission::BusinessSettings,
            Permission::BusinessDelete,
            Permission::UserRead,
            Permission::UserInvite,
            Permission::UserUpdateRole,
            Permission::UserUpdatePermissions,
            Permission::UserRemove,
            Permission::InvoiceCreate,
            Permission::InvoiceRead,
            Permission::InvoiceUpdate,
            Permission::InvoiceDelete,
            Permission::InvoiceExport,
            Permission::InvoiceCancel,
            Permission::PartyCreate,
            Permission::PartyRead,
            Permission::PartyUpdate,
            Permission::PartyDelete,
            Permission::InventoryCreate,
            Permission::InventoryRead,
            Permission::InventoryUpdate,
            Permission::InventoryDelete,
            Permission::InventoryAdjustStock,
            Permission::PaymentCreate,
            Permission::PaymentRead,
            Permission::PaymentUpdate,
            Permission::PaymentDelete,
            Permission::PaymentRefund,
            Permission::ReportView,
            Permission::ReportExport,
            Permission::ReportFinancial,
            Permission::AuditView,
            Permission::AuditExport,
        ];

        ALL
    }

    /// Returns the category this permission belongs to.
    #[must_use]
    pub fn category(&self) -> PermissionCategory {
        match self {
            Self::BusinessRead
            | Self::BusinessUpdate
            | Self::BusinessSettings
            | Self::BusinessDelete => PermissionCategory::Business,
            Self::UserRead
            | Self::UserInvite
            | Self::UserUpdateRole
            | Self::UserUpdatePermissions
            | Self::UserRemove => PermissionCategory::User,
            Self::InvoiceCreate
            | Self::InvoiceRead
            | Self::InvoiceUpdate
            | Self::InvoiceDelete
            | Self::InvoiceExport
            | Self::InvoiceCancel => PermissionCategory::Invoice,
            Self::PartyCreate | Self::PartyRead | Self::PartyUpdate | Self::PartyDelete => {
                PermissionCategory::Party
            }
            Self::InventoryCreate
            | Self::InventoryRead
            | Self::InventoryUpdate
            | Self::InventoryDelete
            | Self::InventoryAdjustStock => PermissionCategory::Inventory,
            Self::PaymentCreate
            | Self::PaymentRead
            | Self::PaymentUpdate
            | Self::PaymentDelete
            | Self::PaymentRefund => PermissionCategory::Payment,
            Self::ReportView | Self::ReportExport | Self::ReportFinancial => {
                PermissionCategory::Report
            }
            Self::AuditView | Self::AuditExport => PermissionCategory::Audit,
        }
    }

    /// Returns a short display label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::BusinessRead => "View business",
            Self::BusinessUpdate => "Edit business",
            Self::BusinessSettings => "Manage settings",
            Self::BusinessDelete => "Delete business",
            Self::UserRead => "View members",
            Self::UserInvite => "Invite members",
            Self::UserUpdateRole => "Change roles",
            Self::UserUpdatePermissions => "Customize permissions",
            Self::UserRemove => "Remove members",
            Self::InvoiceCreate => "Create invoices",
            Self::InvoiceRead => "View invoices",
            Self::InvoiceUpdate => "Edit invoices",
            Self::InvoiceDelete => "Delete invoices",
            Self::InvoiceExport => "Export invoices",
            Self::InvoiceCancel => "Cancel invoices",
            Self::PartyCreate => "Create parties",
            Self::PartyRead => "View parties",
            Self::PartyUpdate => "Edit parties",
            Self::PartyDelete => "Delete parties",
            Self::InventoryCreate => "Create items",
            Self::InventoryRead => "View inventory",
            Self::InventoryUpdate => "Edit items",
            Self::InventoryDelete => "Delete items",
            Self::InventoryAdjustStock => "Adjust stock",
            Self::PaymentCreate => "Record payments",
            Self::PaymentRead => "View payments",
            Self::PaymentUpdate => "Edit payments",
            Self::PaymentDelete => "Delete payments",
            Self::PaymentRefund => "Issue refunds",
            Self::ReportView => "View reports",
            Self::ReportExport => "Export reports",
            Self::ReportFinancial => "Financial reports",
            Self::AuditView => "View audit log",
            Self::AuditExport => "Export audit log",
        }
    }

    /// Returns a one-line description for UI rendering.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::BusinessRead => "See the business profile and contact details",
            Self::BusinessUpdate => "Change the business name, address and tax registration",
            Self::BusinessSettings => "Change invoice numbering, tax and notification settings",
            Self::BusinessDelete => "Permanently delete the business and its data",
            Self::UserRead => "See who has access to the business",
            Self::UserInvite => "Invite new members and assign them a role",
            Self::UserUpdateRole => "Move members between roles",
            Self::UserUpdatePermissions => "Grant or restrict individual permissions for a member",
            Self::UserRemove => "Revoke a member's access to the business",
            Self::InvoiceCreate => "Create new sales invoices",
            Self::InvoiceRead => "Browse and open invoices",
            Self::InvoiceUpdate => "Edit draft and issued invoices",
            Self::InvoiceDelete => "Delete invoices",
            Self::InvoiceExport => "Download invoices as PDF or spreadsheet",
            Self::InvoiceCancel => "Cancel issued invoices",
            Self::PartyCreate => "Add customers and suppliers",
            Self::PartyRead => "Browse customers and suppliers",
            Self::PartyUpdate => "Edit customer and supplier details",
            Self::PartyDelete => "Delete customers and suppliers",
            Self::InventoryCreate => "Add items to the catalog",
            Self::InventoryRead => "Browse items and stock levels",
            Self::InventoryUpdate => "Edit item details and prices",
            Self::InventoryDelete => "Delete items",
            Self::InventoryAdjustStock => "Post manual stock corrections",
            Self::PaymentCreate => "Record received and outgoing payments",
            Self::PaymentRead => "Browse payments",
            Self::PaymentUpdate => "Edit recorded payments",
            Self::PaymentDelete => "Delete recorded payments",
            Self::PaymentRefund => "Refund received payments",
            Self::ReportView => "Open sales, stock and party reports",
            Self::ReportExport => "Download reports",
            Self::ReportFinancial => "Open profit and loss, balance sheet and tax reports",
            Self::AuditView => "Read the history of role and permission changes",
            Self::AuditExport => "Download the audit history",
        }
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|permission| permission.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown permission value '{value}'")))
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::from_str(value.as_str()).map_err(serde::de::Error::custom)
    }
}

/// Stable audit actions recorded for membership mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    /// A user was invited to the business.
    UserInvite,
    /// A user was given an active membership.
    UserAssign,
    /// A membership was soft-removed.
    UserRemove,
    /// A member's role changed.
    RoleUpdate,
    /// A member's custom permission overrides changed.
    PermissionUpdate,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserInvite => "user:invite",
            Self::UserAssign => "user:assign",
            Self::UserRemove => "user:remove",
            Self::RoleUpdate => "role:update",
            Self::PermissionUpdate => "permission:update",
        }
    }
}

impl FromStr for AuditAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user:invite" => Ok(Self::UserInvite),
            "user:assign" => Ok(Self::UserAssign),
            "user:remove" => Ok(Self::UserRemove),
            "role:update" => Ok(Self::RoleUpdate),
            "permission:update" => Ok(Self::PermissionUpdate),
            _ => Err(AppError::Validation(format!(
                "unknown audit action value '{value}'"
            ))),
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}
