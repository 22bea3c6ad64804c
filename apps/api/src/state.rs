use std::sync::Arc;

use ledgerguard_application::{
    AccessGuard, AuditLogRepository, AuditLogService, AuditRecorder, AuditRepository,
    AuthorizationEnforcer, BusinessContextResolver, EffectivePermissionResolver,
    MembershipRepository, MembershipService, MissingMembershipPolicy,
};
use ledgerguard_domain::RolePermissionMap;

use crate::api_config::IdentityHeaders;

/// Storage ports wired into the application services.
pub struct Repositories {
    pub memberships: Arc<dyn MembershipRepository>,
    pub audit: Arc<dyn AuditRepository>,
    pub audit_log: Arc<dyn AuditLogRepository>,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub access_guard: AccessGuard,
    pub membership_service: MembershipService,
    pub audit_log_service: AuditLogService,
    pub role_permissions: Arc<RolePermissionMap>,
    pub identity_headers: Arc<IdentityHeaders>,
    pub business_body_limit_bytes: usize,
}

impl AppState {
    pub fn new(
        repositories: Repositories,
        missing_membership_policy: MissingMembershipPolicy,
        identity_headers: IdentityHeaders,
        business_body_limit_bytes: usize,
    ) -> Self {
        let role_permissions = Arc::new(RolePermissionMap::standard().clone());
        let permissions = EffectivePermissionResolver::new(role_permissions.clone());
        let enforcer = Arc::new(AuthorizationEnforcer::new());

        let access_guard = AccessGuard::new(
            BusinessContextResolver::new(
                repositories.memberships.clone(),
                permissions.clone(),
                missing_membership_policy,
            ),
            enforcer.clone(),
        );
        let membership_service = MembershipService::new(
            repositories.memberships.clone(),
            AuditRecorder::new(repositories.audit, repositories.memberships),
            permissions,
            enforcer.clone(),
        );
        let audit_log_service = AuditLogService::new(repositories.audit_log, enforcer);

        Self {
            access_guard,
            membership_service,
            audit_log_service,
            role_permissions,
            identity_headers: Arc::new(identity_headers),
            business_body_limit_bytes,
        }
    }
}
