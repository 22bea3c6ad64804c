use axum::Json;
use axum::extract::State;
use ledgerguard_domain::{Role, permission_catalog};

use crate::dto::{PermissionCategoryResponse, RoleResponse};
use crate::state::AppState;

pub async fn list_permissions_handler(
    State(state): State<AppState>,
) -> Json<Vec<PermissionCategoryResponse>> {
    Json(
        permission_catalog(&state.role_permissions)
            .into_iter()
            .map(PermissionCategoryResponse::from)
            .collect(),
    )
}

pub async fn list_roles_handler(State(state): State<AppState>) -> Json<Vec<RoleResponse>> {
    Json(
        Role::all()
            .iter()
            .map(|role| RoleResponse::new(*role, &state.role_permissions.permissions_for(*role)))
            .collect(),
    )
}
