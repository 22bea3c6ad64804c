use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledgerguard_core::{AppResult, BusinessId, UserId};
use ledgerguard_domain::{AuditAction, AuditEvent, AuditRecord};

/// Largest page the audit query surface returns.
pub const AUDIT_LOG_MAX_LIMIT: usize = 200;

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event and returns the stored record.
    async fn append_event(&self, event: AuditEvent) -> AppResult<AuditRecord>;
}

/// Filters for audit log listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogQuery {
    /// Optional action filter.
    pub action: Option<AuditAction>,
    /// Optional actor filter.
    pub actor_user_id: Option<UserId>,
    /// Optional target filter.
    pub target_user_id: Option<UserId>,
    /// Inclusive lower bound on `created_at`.
    pub start_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub end_date: Option<DateTime<Utc>>,
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
}

impl Default for AuditLogQuery {
    fn default() -> Self {
        Self {
            action: None,
            actor_user_id: None,
            target_user_id: None,
            start_date: None,
            end_date: None,
            limit: 50,
            offset: 0,
        }
    }
}

impl AuditLogQuery {
    /// Returns the limit clamped to the supported page size.
    #[must_use]
    pub fn capped_limit(&self) -> usize {
        self.limit.clamp(1, AUDIT_LOG_MAX_LIMIT)
    }

    /// Returns whether a record passes every filter.
    #[must_use]
    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.action.is_none_or(|action| record.action == action)
            && self
                .actor_user_id
                .as_ref()
                .is_none_or(|actor| record.actor_user_id.as_ref() == Some(actor))
            && self
                .target_user_id
                .as_ref()
                .is_none_or(|target| record.target_user_id.as_ref() == Some(target))
            && self.start_date.is_none_or(|start| record.created_at >= start)
            && self.end_date.is_none_or(|end| record.created_at <= end)
    }
}

/// One page of audit records, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogPage {
    /// Number of records matching the filters, ignoring pagination.
    pub total: u64,
    /// Records ordered by `created_at desc, id desc`.
    pub logs: Vec<AuditRecord>,
}

/// Port for reading business audit logs.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Lists audit records for a business.
    async fn list_entries(
        &self,
        business_id: BusinessId,
        query: AuditLogQuery,
    ) -> AppResult<AuditLogPage>;
}
