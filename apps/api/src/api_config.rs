use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use ledgerguard_application::MissingMembershipPolicy;
use ledgerguard_core::AppError;
use tracing_subscriber::EnvFilter;

const DEFAULT_BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Storage adapter selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

/// Headers set by the upstream identity gateway after verifying the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityHeaders {
    pub user_header: String,
    pub superadmin_header: String,
}

impl Default for IdentityHeaders {
    fn default() -> Self {
        Self {
            user_header: "x-authenticated-user-id".to_owned(),
            superadmin_header: "x-authenticated-superadmin".to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub api_host: String,
    pub api_port: u16,
    pub missing_membership_policy: MissingMembershipPolicy,
    pub business_body_limit_bytes: usize,
    pub identity_headers: IdentityHeaders,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let storage_backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_owned())
            .as_str()
        {
            "postgres" => StorageBackend::Postgres,
            "memory" => StorageBackend::Memory,
            other => {
                return Err(AppError::Validation(format!(
                    "STORAGE_BACKEND must be either 'postgres' or 'memory', got '{other}'"
                )));
            }
        };

        let database_url = match storage_backend {
            StorageBackend::Postgres => Some(required_non_empty_env("DATABASE_URL")?),
            StorageBackend::Memory => env::var("DATABASE_URL").ok(),
        };
        if migrate_only && database_url.is_none() {
            return Err(AppError::Validation(
                "DATABASE_URL is required to run migrations".to_owned(),
            ));
        }

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let missing_membership_policy = env::var("MISSING_MEMBERSHIP_POLICY")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|value| MissingMembershipPolicy::from_str(value.as_str()))
            .transpose()?
            .unwrap_or_default();

        let business_body_limit_bytes = env::var("BUSINESS_BODY_LIMIT_BYTES")
            .ok()
            .map(|value| {
                value.parse::<usize>().map_err(|error| {
                    AppError::Validation(format!("invalid BUSINESS_BODY_LIMIT_BYTES: {error}"))
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_BODY_LIMIT_BYTES);

        let defaults = IdentityHeaders::default();
        let identity_headers = IdentityHeaders {
            user_header: env::var("IDENTITY_USER_HEADER")
                .map(|value| value.to_ascii_lowercase())
                .unwrap_or(defaults.user_header),
            superadmin_header: env::var("IDENTITY_SUPERADMIN_HEADER")
                .map(|value| value.to_ascii_lowercase())
                .unwrap_or(defaults.superadmin_header),
        };

        Ok(Self {
            migrate_only,
            storage_backend,
            database_url,
            api_host,
            api_port,
            missing_membership_policy,
            business_body_limit_bytes,
            identity_headers,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}
