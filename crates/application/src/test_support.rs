use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use ledgerguard_core::{AppError, AppResult, BusinessId, UserId};
use ledgerguard_domain::{
    AuditEvent, AuditRecord, Membership, MembershipChange, MembershipMutation, MembershipStatus,
    PermissionOverrides, RequestMetadata, Role,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    AuditLogPage, AuditLogQuery, AuditLogRepository, AuditRepository, MembershipRepository,
};

#[derive(Default)]
struct FakeState {
    memberships: BTreeMap<(BusinessId, UserId), Membership>,
    records: Vec<AuditRecord>,
    lookups: usize,
}

/// Membership and audit fake sharing one lock, matching the atomic contract.
#[derive(Default)]
pub(crate) struct FakeAuthorizationStore {
    state: Mutex<FakeState>,
}

impl FakeAuthorizationStore {
    pub(crate) async fn seed(
        &self,
        business_id: BusinessId,
        user_id: &UserId,
        role: Role,
        is_owner: bool,
        custom_permissions: Option<PermissionOverrides>,
    ) {
        let mut state = self.state.lock().await;
        let key = (business_id, user_id.clone());
        let current = state.memberships.get(&key).cloned();
        let mutation = MembershipMutation::Assign {
            role,
            custom_permissions,
            is_owner,
        };
        let Ok(next) = mutation.apply(business_id, user_id, current.as_ref(), Utc::now()) else {
            panic!("seed membership should be valid");
        };
        state.memberships.insert(key, next);
    }

    pub(crate) async fn records(&self) -> Vec<AuditRecord> {
        self.state.lock().await.records.clone()
    }

    pub(crate) async fn lookups(&self) -> usize {
        self.state.lock().await.lookups
    }

    /// Stores a record with an explicit timestamp offset, for ordering tests.
    pub(crate) async fn push_record(&self, event: AuditEvent, seconds_ago: i64) -> AuditRecord {
        let record = event.into_record(Uuid::new_v4(), Utc::now() - Duration::seconds(seconds_ago));
        self.state.lock().await.records.push(record.clone());
        record
    }
}

#[async_trait]
impl MembershipRepository for FakeAuthorizationStore {
    async fn find_membership(
        &self,
        business_id: BusinessId,
        user_id: &UserId,
    ) -> AppResult<Option<Membership>> {
        let mut state = self.state.lock().await;
        state.lookups += 1;
        Ok(state
            .memberships
            .get(&(business_id, user_id.clone()))
            .cloned())
    }

    async fn list_memberships(
        &self,
        business_id: BusinessId,
        include_removed: bool,
    ) -> AppResult<Vec<Membership>> {
        let state = self.state.lock().await;
        Ok(state
            .memberships
            .values()
            .filter(|membership| membership.business_id() == business_id)
            .filter(|membership| {
                include_removed || membership.status() != MembershipStatus::Removed
            })
            .cloned()
            .collect())
    }

    async fn apply_change(&self, change: MembershipChange) -> AppResult<(Membership, AuditRecord)> {
        let mut state = self.state.lock().await;
        let key = (change.business_id, change.user_id.clone());
        let now = Utc::now();
        let (next, event) = change.resolve(state.memberships.get(&key), now)?;
        event.validate()?;
        let record = event.into_record(Uuid::new_v4(), now);
        state.memberships.insert(key, next.clone());
        state.records.push(record.clone());
        Ok((next, record))
    }
}

#[async_trait]
impl AuditRepository for FakeAuthorizationStore {
    async fn append_event(&self, event: AuditEvent) -> AppResult<AuditRecord> {
        let record = event.into_record(Uuid::new_v4(), Utc::now());
        self.state.lock().await.records.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl AuditLogRepository for FakeAuthorizationStore {
    async fn list_entries(
        &self,
        business_id: BusinessId,
        query: AuditLogQuery,
    ) -> AppResult<AuditLogPage> {
        let state = self.state.lock().await;
        let mut matching: Vec<AuditRecord> = state
            .records
            .iter()
            .filter(|record| record.business_id == business_id && query.matches(record))
            .cloned()
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
                .collect(),
        })
    }
}

/// Membership port that fails every call, for fail-closed tests.
pub(crate) struct FailingMembershipRepository;

#[async_trait]
impl MembershipRepository for FailingMembershipRepository {
    async fn find_membership(
        &self,
        _business_id: BusinessId,
        _user_id: &UserId,
    ) -> AppResult<Option<Membership>> {
        Err(AppError::Internal("membership store unavailable".to_owned()))
    }

    async fn list_memberships(
        &self,
        _business_id: BusinessId,
        _include_removed: bool,
    ) -> AppResult<Vec<Membership>> {
        Err(AppError::Internal("membership store unavailable".to_owned()))
    }

    async fn apply_change(
        &self,
        _change: MembershipChange,
    ) -> AppResult<(Membership, AuditRecord)> {
        Err(AppError::Internal("membership store unavailable".to_owned()))
    }
}

pub(crate) fn user(value: &str) -> UserId {
    let Ok(user_id) = UserId::new(value) else {
        panic!("test user id should be valid");
    };
    user_id
}

pub(crate) fn metadata() -> RequestMetadata {
    RequestMetadata {
        ip_address: Some("203.0.113.7".to_owned()),
        user_agent: Some("ledgerguard-tests".to_owned()),
    }
}
