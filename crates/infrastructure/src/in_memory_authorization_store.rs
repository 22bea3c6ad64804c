use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use ledgerguard_application::{
    AuditLogPage, AuditLogQuery, AuditLogRepository, AuditRepository, MembershipRepository,
};
use ledgerguard_core::{AppError, AppResult, BusinessId, UserId};
use ledgerguard_domain::{AuditEvent, AuditRecord, Membership, MembershipChange, MembershipStatus};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Default)]
struct AuthorizationState {
    memberships: HashMap<(BusinessId, UserId), Membership>,
    audit_records: Vec<AuditRecord>,
}

/// In-memory membership and audit store for development and tests.
///
/// Memberships and audit records live behind one lock, so a change and its
/// audit record become visible together.
#[derive(Debug, Default)]
pub struct InMemoryAuthorizationStore {
    state: RwLock<AuthorizationState>,
    fail_next_audit_write: AtomicBool,
}

impl InMemoryAuthorizationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next audit write fail after the membership row was staged.
    pub fn fail_next_audit_write(&self) {
        self.fail_next_audit_write.store(true, Ordering::SeqCst);
    }

    fn take_audit_fault(&self) -> AppResult<()> {
        if self.fail_next_audit_write.swap(false, Ordering::SeqCst) {
            warn!("injected audit write failure");
            return Err(AppError::Internal(
                "failed to append audit record: injected fault".to_owned(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl MembershipRepository for InMemoryAuthorizationStore {
    async fn find_membership(
        &self,
        business_id: BusinessId,
        user_id: &UserId,
    ) -> AppResult<Option<Membership>> {
        Ok(self
            .state
            .read()
            .await
            .memberships
            .get(&(business_id, user_id.clone()))
            .cloned())
    }

    async fn list_memberships(
        &self,
        business_id: BusinessId,
        include_removed: bool,
    ) -> AppResult<Vec<Membership>> {
        let state = self.state.read().await;
        let mut memberships: Vec<Membership> = state
            .memberships
            .values()
            .filter(|membership| membership.business_id() == business_id)
            .filter(|membership| include_removed || membership.status() != MembershipStatus::Removed)
            .cloned()
            .collect();
        memberships.sort_by(|left, right| left.user_id().cmp(right.user_id()));

        Ok(memberships)
    }

    async fn apply_change(&self, change: MembershipChange) -> AppResult<(Membership, AuditRecord)> {
        let mut state = self.state.write().await;
        let key = (change.business_id, change.user_id.clone());
        let now = Utc::now();

        let previous = state.memberships.get(&key).cloned();
        let (next, event) = change.resolve(previous.as_ref(), now)?;
        event.validate()?;

        state.memberships.insert(key.clone(), next.clone());

        if let Err(error) = self.take_audit_fault() {
            match previous {
                Some(previous) => state.memberships.insert(key, previous),
                None => state.memberships.remove(&key),
            };
            return Err(error);
        }

        let record = event.into_record(Uuid::new_v4(), now);
        state.audit_records.push(record.clone());

        Ok((next, record))
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuthorizationStore {
    async fn append_event(&self, event: AuditEvent) -> AppResult<AuditRecord> {
        let mut state = self.state.write().await;
        self.take_audit_fault()?;

        let record = event.into_record(Uuid::new_v4(), Utc::now());
        state.audit_records.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryAuthorizationStore {
    async fn list_entries(
        &self,
        business_id: BusinessId,
        query: AuditLogQuery,
    ) -> AppResult<AuditLogPage> {
        let state = self.state.read().await;
        let mut matching: Vec<&AuditRecord> = state
            .audit_records
            .iter()
            .filter(|record| record.business_id == business_id && query.matches(record))
            .collect();
        matching.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| right.id.cmp(&left.id))
        });

        Ok(AuditLogPage {
            total: matching.len() as u64,
            logs: matching
                .into_iter()
                .skip(query.offset)
                .take(query.capped_limit())
                .cloned()
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests;
