use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use ledgerguard_application::{AuditLogPage, AuditLogQuery, AuditLogRepository};
use ledgerguard_core::{AppError, AppResult, BusinessId, UserId};
use ledgerguard_domain::{AuditAction, AuditRecord};

/// PostgreSQL-backed repository for audit log read models.
#[derive(Clone)]
pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditLogRow {
    id: Uuid,
    business_id: Uuid,
    actor_user_id: Option<String>,
    target_user_id: Option<String>,
    action: String,
    old_value: Option<Value>,
    new_value: Option<Value>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditLogRow> for AuditRecord {
    type Error = AppError;

    fn try_from(row: AuditLogRow) -> Result<Self, Self::Error> {
        let action = AuditAction::from_str(row.action.as_str()).map_err(|error| {
            AppError::Internal(format!(
                "invalid stored audit action '{}' for record '{}': {error}",
                row.action, row.id
            ))
        })?;

        let actor_user_id = stored_user_id(row.actor_user_id, "actor", row.id)?;
        let target_user_id = stored_user_id(row.target_user_id, "target", row.id)?;

        Ok(AuditRecord {
            id: row.id,
            business_id: BusinessId::from_uuid(row.business_id),
            actor_user_id,
            target_user_id,
            action,
            old_value: row.old_value,
            new_value: row.new_value,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

fn stored_user_id(value: Option<String>, column: &str, record_id: Uuid) -> AppResult<Option<UserId>> {
    value
        .map(UserId::new)
        .transpose()
        .map_err(|error| {
            AppError::Internal(format!(
                "invalid stored {column} user id for record '{record_id}': {error}"
            ))
        })
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn list_entries(
        &self,
        business_id: BusinessId,
        query: AuditLogQuery,
    ) -> AppResult<AuditLogPage> {
        let capped_limit = query.capped_limit() as i64;
        let offset = i64::try_from(query.offset).unwrap_or(i64::MAX);
        let action = query.action.map(|action| action.as_str());
        let actor = query.actor_user_id.as_ref().map(UserId::as_str);
        let target = query.target_user_id.as_ref().map(UserId::as_str);

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM authorization_audit_log
            WHERE business_id = $1
                AND ($2::TEXT IS NULL OR action = $2)
                AND ($3::TEXT IS NULL OR actor_user_id = $3)
                AND ($4::TEXT IS NULL OR target_user_id = $4)
                AND ($5::TIMESTAMPTZ IS NULL OR created_at >= $5)
                AND ($6::TIMESTAMPTZ IS NULL OR created_at <= $6)
            "#,
        )
        .bind(business_id.as_uuid())
        .bind(action)
        .bind(actor)
        .bind(target)
        .bind(query.start_date)
        .bind(query.end_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count audit log entries: {error}")))?;

        let rows = sqlx::query_as::<_, AuditLogRow>(
            r#"
            SELECT
                id,
                business_id,
                actor_user_id,
                target_user_id,
                action,
                old_value,
                new_value,
                ip_address,
                user_agent,
                notes,
                created_at
            FROM authorization_audit_log
            WHERE business_id = $1
                AND ($2::TEXT IS NULL OR action = $2)
                AND ($3::TEXT IS NULL OR actor_user_id = $3)
                AND ($4::TEXT IS NULL OR target_user_id = $4)
                AND ($5::TIMESTAMPTZ IS NULL OR created_at >= $5)
                AND ($6::TIMESTAMPTZ IS NULL OR created_at <= $6)
            ORDER BY created_at DESC, id DESC
            LIMIT $7
            OFFSET $8
            "#,
        )
        .bind(business_id.as_uuid())
        .bind(action)
        .bind(actor)
        .bind(target)
        .bind(query.start_date)
        .bind(query.end_date)
        .bind(capped_limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list audit log entries: {error}")))?;

        Ok(AuditLogPage {
            total: u64::try_from(total).unwrap_or_default(),
            logs: rows
                .into_iter()
                .map(AuditRecord::try_from)
                .collect::<AppResult<Vec<_>>>()?,
        })
    }
}
