use std::str::FromStr;

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use ledgerguard_application::{AssignMemberInput, BusinessContext};
use ledgerguard_core::{BusinessId, Identity, UserId};
use ledgerguard_domain::{PermissionOverrides, RequestMetadata, Role};

use crate::dto::{
    AssignMemberRequest, InviteMemberRequest, ListMembersQuery, MemberPermissionsResponse,
    MembershipResponse, MembershipUpdateResponse, UpdatePermissionsRequest, UpdateRoleRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_members_handler(
    State(state): State<AppState>,
    Extension(context): Extension<BusinessContext>,
    Query(query): Query<ListMembersQuery>,
) -> ApiResult<Json<Vec<MembershipResponse>>> {
    let members = state
        .membership_service
        .list_members(&context, query.include_removed.unwrap_or(false))
        .await?
        .into_iter()
        .map(MembershipResponse::from)
        .collect();

    Ok(Json(members))
}

pub async fn assign_member_handler(
    State(state): State<AppState>,
    Extension(context): Extension<BusinessContext>,
    Extension(metadata): Extension<RequestMetadata>,
    Json(payload): Json<AssignMemberRequest>,
) -> ApiResult<(StatusCode, Json<MembershipUpdateResponse>)> {
    let input = AssignMemberInput {
        user_id: UserId::new(payload.user_id)?,
        role: Role::from_str(payload.role.as_str())?,
        custom_permissions: payload.custom_permissions.map(PermissionOverrides::from_iter),
        is_owner: payload.is_owner,
    };
    let update = state
        .membership_service
        .assign_member(&context, input, metadata)
        .await?;

    Ok((StatusCode::CREATED, Json(update.into())))
}

pub async fn invite_member_handler(
    State(state): State<AppState>,
    Extension(context): Extension<BusinessContext>,
    Extension(metadata): Extension<RequestMetadata>,
    Json(payload): Json<InviteMemberRequest>,
) -> ApiResult<(StatusCode, Json<MembershipUpdateResponse>)> {
    let update = state
        .membership_service
        .invite_member(
            &context,
            UserId::new(payload.user_id)?,
            Role::from_str(payload.role.as_str())?,
            metadata,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(update.into())))
}

pub async fn accept_invitation_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Extension(metadata): Extension<RequestMetadata>,
    Path(business_id): Path<String>,
) -> ApiResult<Json<MembershipUpdateResponse>> {
    let update = state
        .membership_service
        .accept_invitation(&identity, BusinessId::from_str(business_id.as_str())?, metadata)
        .await?;

    Ok(Json(update.into()))
}

pub async fn member_permissions_handler(
    State(state): State<AppState>,
    Extension(context): Extension<BusinessContext>,
    Path((_business_id, user_id)): Path<(String, String)>,
) -> ApiResult<Json<MemberPermissionsResponse>> {
    let user_id = UserId::new(user_id)?;
    let permissions = state
        .membership_service
        .effective_permissions_for(&context, &user_id)
        .await?;

    Ok(Json(MemberPermissionsResponse {
        user_id: user_id.to_string(),
        permissions: permissions
            .into_iter()
            .map(|permission| permission.as_str().to_owned())
            .collect(),
    }))
}

pub async fn update_role_handler(
    State(state): State<AppState>,
    Extension(context): Extension<BusinessContext>,
    Extension(metadata): Extension<RequestMetadata>,
    Path((_business_id, user_id)): Path<(String, String)>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<Json<MembershipUpdateResponse>> {
    let update = state
        .membership_service
        .update_role(
            &context,
            UserId::new(user_id)?,
            Role::from_str(payload.role.as_str())?,
            metadata,
        )
        .await?;

    Ok(Json(update.into()))
}

pub async fn update_permissions_handler(
    State(state): State<AppState>,
    Extension(context): Extension<BusinessContext>,
    Extension(metadata): Extension<RequestMetadata>,
    Path((_business_id, user_id)): Path<(String, String)>,
    Json(payload): Json<UpdatePermissionsRequest>,
) -> ApiResult<Json<MembershipUpdateResponse>> {
    let update = state
        .membership_service
        .update_permissions(
            &context,
            UserId::new(user_id)?,
            payload
                .custom_permissions
                .map(PermissionOverrides::from_iter),
            metadata,
        )
        .await?;

    Ok(Json(update.into()))
}

pub async fn remove_member_handler(
    State(state): State<AppState>,
    Extension(context): Extension<BusinessContext>,
    Extension(metadata): Extension<RequestMetadata>,
    Path((_business_id, user_id)): Path<(String, String)>,
) -> ApiResult<Json<MembershipUpdateResponse>> {
    let update = state
        .membership_service
        .remove_member(&context, UserId::new(user_id)?, metadata)
        .await?;

    Ok(Json(update.into()))
}
