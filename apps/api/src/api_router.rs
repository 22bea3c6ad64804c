use axum::Router;
use axum::extract::Extension;
use axum::middleware::from_fn_with_state;
use axum::routing::{MethodRouter, delete, get, post, put};
use ledgerguard_application::{Operation, operations};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

const BUSINESS_PATH: &str = "/api/businesses/{businessId}";

pub fn build_router(app_state: AppState) -> Router {
    let business_routes = Router::new()
        .route(
            "/api/context",
            guarded(
                &app_state,
                operations::VIEW_CONTEXT,
                get(handlers::context::business_context_handler),
            ),
        )
        .route(
            &format!("{BUSINESS_PATH}/context"),
            guarded(
                &app_state,
                operations::VIEW_CONTEXT,
                get(handlers::context::business_context_handler),
            ),
        )
        .route(
            &format!("{BUSINESS_PATH}/members"),
            guarded(
                &app_state,
                operations::LIST_MEMBERS,
                get(handlers::members::list_members_handler),
            )
            .merge(guarded(
                &app_state,
                operations::ASSIGN_MEMBER,
                post(handlers::members::assign_member_handler),
            )),
        )
        .route(
            &format!("{BUSINESS_PATH}/invitations"),
            guarded(
                &app_state,
                operations::INVITE_MEMBER,
                post(handlers::members::invite_member_handler),
            ),
        )
        .route(
            &format!("{BUSINESS_PATH}/members/{{userId}}"),
            guarded(
                &app_state,
                operations::REMOVE_MEMBER,
                delete(handlers::members::remove_member_handler),
            ),
        )
        .route(
            &format!("{BUSINESS_PATH}/members/{{userId}}/role"),
            guarded(
                &app_state,
                operations::UPDATE_ROLE,
                put(handlers::members::update_role_handler),
            ),
        )
        .route(
            &format!("{BUSINESS_PATH}/members/{{userId}}/permissions"),
            guarded(
                &app_state,
                operations::VIEW_MEMBER_PERMISSIONS,
                get(handlers::members::member_permissions_handler),
            )
            .merge(guarded(
                &app_state,
                operations::UPDATE_PERMISSIONS,
                put(handlers::members::update_permissions_handler),
            )),
        )
        .route(
            &format!("{BUSINESS_PATH}/audit-log"),
            guarded(
                &app_state,
                operations::LIST_AUDIT_LOG,
                get(handlers::audit::list_audit_log_handler),
            ),
        );

    // Identity only: invitees and catalog readers have no active membership yet.
    let identity_routes = Router::new()
        .route(
            "/api/permissions",
            get(handlers::catalog::list_permissions_handler),
        )
        .route("/api/roles", get(handlers::catalog::list_roles_handler))
        .route(
            &format!("{BUSINESS_PATH}/invitations/accept"),
            post(handlers::members::accept_invitation_handler),
        );

    let protected_routes = business_routes.merge(identity_routes).route_layer(
        from_fn_with_state(app_state.clone(), middleware::require_identity),
    );

    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Declares the operation a route performs and enforces it before the handler runs.
fn guarded(
    app_state: &AppState,
    operation: Operation,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    route
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::authorize_business,
        ))
        .layer(Extension(operation))
}
