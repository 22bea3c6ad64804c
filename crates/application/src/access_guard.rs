use std::sync::Arc;

use ledgerguard_core::{AppError, AppResult, BusinessId, Identity};
use tracing::error;

use crate::{
    AuthorizationEnforcer, BusinessContext, BusinessContextResolver, BusinessIdSources, Operation,
};

/// Resolves a business context once per request and enforces an operation
/// declaration against it.
///
/// Storage failures while resolving are reported as `Forbidden`.
#[derive(Clone)]
pub struct AccessGuard {
    resolver: BusinessContextResolver,
    enforcer: Arc<AuthorizationEnforcer>,
}

impl AccessGuard {
    /// Creates a guard.
    #[must_use]
    pub fn new(resolver: BusinessContextResolver, enforcer: Arc<AuthorizationEnforcer>) -> Self {
        Self { resolver, enforcer }
    }

    /// Returns the shared enforcer.
    #[must_use]
    pub fn enforcer(&self) -> &Arc<AuthorizationEnforcer> {
        &self.enforcer
    }

    /// Resolves the caller's context from request sources and enforces `operation`.
    pub async fn authorize(
        &self,
        identity: Option<&Identity>,
        sources: &BusinessIdSources,
        operation: &Operation,
    ) -> AppResult<BusinessContext> {
        let context = self
            .resolver
            .resolve(identity, sources)
            .await
            .map_err(|error| fail_closed(operation, error))?;
        self.enforcer.enforce(operation, &context)?;
        Ok(context)
    }

    /// Same as [`AccessGuard::authorize`] for an already parsed business id.
    pub async fn authorize_for(
        &self,
        identity: &Identity,
        business_id: BusinessId,
        operation: &Operation,
    ) -> AppResult<BusinessContext> {
        let context = self
            .resolver
            .resolve_for(identity, business_id)
            .await
            .map_err(|error| fail_closed(operation, error))?;
        self.enforcer.enforce(operation, &context)?;
        Ok(context)
    }
}

fn fail_closed(operation: &Operation, error: AppError) -> AppError {
    match error {
        AppError::Internal(message) => {
            error!(
                operation = operation.name(),
                error = %message,
                "business context resolution failed"
            );
            AppError::Forbidden("access could not be verified".to_owned())
        }
        other => other,
    }
}
