use std::sync::Arc;

use ledgerguard_core::{AppError, AppResult};

use crate::{
    AuditLogPage, AuditLogQuery, AuditLogRepository, AuthorizationEnforcer, BusinessContext,
    operations,
};

/// Read-only audit log access for admin tooling.
#[derive(Clone)]
pub struct AuditLogService {
    repository: Arc<dyn AuditLogRepository>,
    enforcer: Arc<AuthorizationEnforcer>,
}

impl AuditLogService {
    /// Creates an audit log service.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditLogRepository>, enforcer: Arc<AuthorizationEnforcer>) -> Self {
        Self {
            repository,
            enforcer,
        }
    }

    /// Lists audit records of the context business, newest first.
    pub async fn list(
        &self,
        context: &BusinessContext,
        query: AuditLogQuery,
    ) -> AppResult<AuditLogPage> {
        self.enforcer.enforce(&operations::LIST_AUDIT_LOG, context)?;

        if let (Some(start), Some(end)) = (query.start_date, query.end_date)
            && start > end
        {
            return Err(AppError::Validation(
                "audit log start date must not be after end date".to_owned(),
            ));
        }

        let query = AuditLogQuery {
            limit: query.capped_limit(),
            ..query
        };
        self.repository
            .list_entries(context.business_id(), query)
            .await
    }
}
