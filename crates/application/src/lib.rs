//! Application services and ports for business-scoped authorization.

#![forbid(unsafe_code)]

mod access_guard;
mod audit_log_service;
mod audit_ports;
mod audit_recorder;
mod authorization_enforcer;
mod business_context;
mod effective_permission_resolver;
mod membership_ports;
mod membership_service;

#[cfg(test)]
mod test_support;

pub use access_guard::AccessGuard;
pub use audit_log_service::AuditLogService;
pub use audit_ports::{
    AUDIT_LOG_MAX_LIMIT, AuditLogPage, AuditLogQuery, AuditLogRepository, AuditRepository,
};
pub use audit_recorder::AuditRecorder;
pub use authorization_enforcer::{
    AuthorizationEnforcer, Decision, Denial, Operation, operations,
};
pub use business_context::{
    BusinessContext, BusinessContextResolver, BusinessIdSource, BusinessIdSources, ContextGrant,
    MissingMembershipPolicy,
};
pub use effective_permission_resolver::EffectivePermissionResolver;
pub use membership_ports::MembershipRepository;
pub use membership_service::{AssignMemberInput, MembershipService, MembershipUpdate};
