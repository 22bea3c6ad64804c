//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_authorization_store;
mod postgres_audit_log_repository;
mod postgres_audit_repository;
mod postgres_membership_repository;

pub use in_memory_authorization_store::InMemoryAuthorizationStore;
pub use postgres_audit_log_repository::PostgresAuditLogRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_membership_repository::PostgresMembershipRepository;
