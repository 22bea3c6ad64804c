//! Domain entities and invariants for business-scoped authorization.

#![forbid(unsafe_code)]

mod audit;
mod catalog;
mod membership;
mod role;
mod security;

pub use audit::{AuditEvent, AuditRecord, PermissionChanges, RequestMetadata};
pub use catalog::{PermissionCategoryGroup, PermissionDescriptor, permission_catalog};
pub use membership::{
    ActorAuthority, Membership, MembershipChange, MembershipMutation, MembershipStatus, PermissionOverrides,
};
pub use role::{Role, RolePermissionMap};
pub use security::{AuditAction, Permission, PermissionCategory};
