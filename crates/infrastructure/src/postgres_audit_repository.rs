use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use ledgerguard_application::AuditRepository;
use ledgerguard_core::{AppError, AppResult};
use ledgerguard_domain::{AuditEvent, AuditRecord};

/// PostgreSQL-backed append-only audit repository.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<AuditRecord> {
        let record = event.into_record(Uuid::new_v4(), Utc::now());

        let mut connection = self.pool.acquire().await.map_err(|error| {
            AppError::Internal(format!("failed to acquire connection: {error}"))
        })?;
        insert_audit_record(&mut *connection, &record).await?;

        Ok(record)
    }
}

/// Inserts one audit record on an existing connection or transaction.
pub(crate) async fn insert_audit_record(
    connection: &mut PgConnection,
    record: &AuditRecord,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO authorization_audit_log (
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
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(record.id)
    .bind(record.business_id.as_uuid())
    .bind(record.actor_user_id.as_ref().map(|actor| actor.as_str()))
    .bind(record.target_user_id.as_ref().map(|target| target.as_str()))
    .bind(record.action.as_str())
    .bind(record.old_value.clone())
    .bind(record.new_value.clone())
    .bind(record.ip_address.as_deref())
    .bind(record.user_agent.as_deref())
    .bind(record.notes.as_deref())
    .bind(record.created_at)
    .execute(connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to append audit record: {error}")))?;

    Ok(())
}
