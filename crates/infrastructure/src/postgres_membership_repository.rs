use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use ledgerguard_application::MembershipRepository;
use ledgerguard_core::{AppError, AppResult, BusinessId, UserId};
use ledgerguard_domain::{
    AuditRecord, Membership, MembershipChange, MembershipStatus, PermissionOverrides, Role,
};

use crate::postgres_audit_repository::insert_audit_record;

/// PostgreSQL-backed membership repository.
///
/// `apply_change` locks the membership row, writes the new state and appends
/// the audit record in one transaction. A first write for a member inserts
/// without overwriting, so a lost creation race surfaces as `Conflict`.
#[derive(Clone)]
pub struct PostgresMembershipRepository {
    pool: PgPool,
}

impl PostgresMembershipRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct MembershipRow {
    business_id: Uuid,
    user_id: String,
    role: String,
    status: String,
    is_owner: bool,
    custom_permissions: Option<Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MembershipRow> for Membership {
    type Error = AppError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        let business_id = BusinessId::from_uuid(row.business_id);
        let role = Role::from_str(row.role.as_str()).map_err(|error| {
            AppError::Internal(format!(
                "invalid stored role '{}' for business '{business_id}': {error}",
                row.role
            ))
        })?;
        let status = MembershipStatus::from_str(row.status.as_str()).map_err(|error| {
            AppError::Internal(format!(
                "invalid stored membership status '{}' for business '{business_id}': {error}",
                row.status
            ))
        })?;
        let custom_permissions = row
            .custom_permissions
            .filter(|value| !value.is_null())
            .map(serde_json::from_value::<PermissionOverrides>)
            .transpose()
            .map_err(|error| {
                AppError::Internal(format!(
                    "invalid stored permission overrides for business '{business_id}': {error}"
                ))
            })?;
        let user_id = UserId::new(row.user_id).map_err(|error| {
            AppError::Internal(format!(
                "invalid stored user id for business '{business_id}': {error}"
            ))
        })?;

        Membership::new(
            business_id,
            user_id,
            role,
            status,
            row.is_owner,
            custom_permissions,
            row.created_at,
            row.updated_at,
        )
        .map_err(|error| AppError::Internal(format!("invalid stored membership: {error}")))
    }
}

#[async_trait]
impl MembershipRepository for PostgresMembershipRepository {
    async fn find_membership(
        &self,
        business_id: BusinessId,
        user_id: &UserId,
    ) -> AppResult<Option<Membership>> {
        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT business_id, user_id, role, status, is_owner, custom_permissions,
                   created_at, updated_at
            FROM business_memberships
            WHERE business_id = $1 AND user_id = $2
            "#,
        )
        .bind(business_id.as_uuid())
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find membership: {error}")))?;

        row.map(Membership::try_from).transpose()
    }

    async fn list_memberships(
        &self,
        business_id: BusinessId,
        include_removed: bool,
    ) -> AppResult<Vec<Membership>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT business_id, user_id, role, status, is_owner, custom_permissions,
                   created_at, updated_at
            FROM business_memberships
            WHERE business_id = $1
                AND ($2 OR status <> 'removed')
            ORDER BY user_id
            "#,
        )
        .bind(business_id.as_uuid())
        .bind(include_removed)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list memberships: {error}")))?;

        rows.into_iter().map(Membership::try_from).collect()
    }

    async fn apply_change(&self, change: MembershipChange) -> AppResult<(Membership, AuditRecord)> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let current = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT business_id, user_id, role, status, is_owner, custom_permissions,
                   created_at, updated_at
            FROM business_memberships
            WHERE business_id = $1 AND user_id = $2
            FOR UPDATE
            "#,
        )
        .bind(change.business_id.as_uuid())
        .bind(change.user_id.as_str())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to lock membership: {error}")))?
        .map(Membership::try_from)
        .transpose()?;

        let now = Utc::now();
        let (next, event) = change.resolve(current.as_ref(), now)?;
        event.validate()?;

        // FOR UPDATE locks nothing for a first write; the insert must not
        // overwrite a row committed by a concurrent creator.
        let persisted = if current.is_some() {
            sqlx::query(
                r#"
                UPDATE business_memberships
                SET role = $3,
                    status = $4,
                    is_owner = $5,
                    custom_permissions = $6,
                    updated_at = $7
                WHERE business_id = $1 AND user_id = $2
                "#,
            )
            .bind(next.business_id().as_uuid())
            .bind(next.user_id().as_str())
            .bind(next.role().as_str())
            .bind(next.status().as_str())
            .bind(next.is_owner())
            .bind(next.custom_permissions().map(PermissionOverrides::to_json))
            .bind(next.updated_at())
            .execute(&mut *transaction)
            .await
        } else {
            sqlx::query(
                r#"
                INSERT INTO business_memberships (
                    business_id,
                    user_id,
                    role,
                    status,
                    is_owner,
                    custom_permissions,
                    created_at,
                    updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (business_id, user_id) DO NOTHING
                "#,
            )
            .bind(next.business_id().as_uuid())
            .bind(next.user_id().as_str())
            .bind(next.role().as_str())
            .bind(next.status().as_str())
            .bind(next.is_owner())
            .bind(next.custom_permissions().map(PermissionOverrides::to_json))
            .bind(next.created_at())
            .bind(next.updated_at())
            .execute(&mut *transaction)
            .await
        }
        .map_err(|error| AppError::Internal(format!("failed to persist membership: {error}")))?;

        if persisted.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "membership for user '{}' in business '{}' was created concurrently",
                change.user_id, change.business_id
            )));
        }

        let record = event.into_record(Uuid::new_v4(), now);
        insert_audit_record(&mut *transaction, &record).await?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        debug!(
            business_id = %record.business_id,
            action = record.action.as_str(),
            "membership change committed"
        );

        Ok((next, record))
    }
}
