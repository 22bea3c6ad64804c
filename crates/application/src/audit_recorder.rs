use std::sync::Arc;

use ledgerguard_core::AppResult;
use ledgerguard_domain::{AuditEvent, AuditRecord, Membership, MembershipChange};
use tracing::info;

use crate::{AuditRepository, MembershipRepository};

/// Writes audit records synchronously before the triggering call returns.
#[derive(Clone)]
pub struct AuditRecorder {
    audit_repository: Arc<dyn AuditRepository>,
    memberships: Arc<dyn MembershipRepository>,
}

impl AuditRecorder {
    /// Creates a recorder.
    #[must_use]
    pub fn new(
        audit_repository: Arc<dyn AuditRepository>,
        memberships: Arc<dyn MembershipRepository>,
    ) -> Self {
        Self {
            audit_repository,
            memberships,
        }
    }

    /// Validates and appends a standalone audit event.
    pub async fn record(&self, event: AuditEvent) -> AppResult<AuditRecord> {
        event.validate()?;
        let record = self.audit_repository.append_event(event).await?;
        log_record(&record);
        Ok(record)
    }

    /// Applies a membership change together with its audit record.
    pub async fn commit(&self, change: MembershipChange) -> AppResult<(Membership, AuditRecord)> {
        let (membership, record) = self.memberships.apply_change(change).await?;
        log_record(&record);
        Ok((membership, record))
    }
}

fn log_record(record: &AuditRecord) {
    info!(
        audit_id = %record.id,
        business_id = %record.business_id,
        action = record.action.as_str(),
        actor = record.actor_user_id.as_ref().map_or("system", |actor| actor.as_str()),
        target = record.target_user_id.as_ref().map_or("-", |target| target.as_str()),
        "authorization change recorded"
    );
}
