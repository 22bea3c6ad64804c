//! Ledgerguard API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use ledgerguard_core::AppError;
use ledgerguard_infrastructure::{
    InMemoryAuthorizationStore, PostgresAuditLogRepository, PostgresAuditRepository,
    PostgresMembershipRepository,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::api_config::{ApiConfig, StorageBackend, init_tracing};
use crate::state::{AppState, Repositories};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let needs_database =
        config.storage_backend == StorageBackend::Postgres || config.migrate_only;
    let pool = match config.database_url.as_deref() {
        Some(database_url) if needs_database => Some(connect_and_migrate(database_url).await?),
        _ => None,
    };

    if config.migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let repositories = match (config.storage_backend, pool) {
        (StorageBackend::Postgres, Some(pool)) => Repositories {
            memberships: Arc::new(PostgresMembershipRepository::new(pool.clone())),
            audit: Arc::new(PostgresAuditRepository::new(pool.clone())),
            audit_log: Arc::new(PostgresAuditLogRepository::new(pool)),
        },
        (StorageBackend::Postgres, None) => {
            return Err(AppError::Validation("DATABASE_URL is required".to_owned()));
        }
        (StorageBackend::Memory, _) => {
            warn!("using in-memory authorization store; data is lost on restart");
            let store = Arc::new(InMemoryAuthorizationStore::new());
            Repositories {
                memberships: store.clone(),
                audit: store.clone(),
                audit_log: store,
            }
        }
    };

    info!(
        policy = config.missing_membership_policy.as_str(),
        "missing membership policy configured"
    );

    let app_state = AppState::new(
        repositories,
        config.missing_membership_policy,
        config.identity_headers.clone(),
        config.business_body_limit_bytes,
    );
    let app = api_router::build_router(app_state);

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "ledgerguard-api listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}

async fn connect_and_migrate(database_url: &str) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}
