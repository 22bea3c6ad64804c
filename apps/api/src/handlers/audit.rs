use std::str::FromStr;

use axum::Json;
use axum::extract::{Extension, Query, State};
use ledgerguard_application::{AuditLogQuery, BusinessContext};
use ledgerguard_core::UserId;
use ledgerguard_domain::AuditAction;

use crate::dto::{AuditLogPageResponse, AuditLogQueryParams};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_audit_log_handler(
    State(state): State<AppState>,
    Extension(context): Extension<BusinessContext>,
    Query(params): Query<AuditLogQueryParams>,
) -> ApiResult<Json<AuditLogPageResponse>> {
    let defaults = AuditLogQuery::default();
    let query = AuditLogQuery {
        action: params
            .action
            .as_deref()
            .map(AuditAction::from_str)
            .transpose()?,
        actor_user_id: params.user_id.map(UserId::new).transpose()?,
        target_user_id: params.target_user_id.map(UserId::new).transpose()?,
        start_date: params.start_date,
        end_date: params.end_date,
        limit: params.limit.unwrap_or(defaults.limit),
        offset: params.offset.unwrap_or(defaults.offset),
    };

    let page = state.audit_log_service.list(&context, query).await?;
    Ok(Json(page.into()))
}
