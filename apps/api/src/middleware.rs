use std::collections::HashMap;
use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::rejection::RawPathParamsRejection;
use axum::extract::{ConnectInfo, Extension, Query, RawPathParams, Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use ledgerguard_application::{BusinessIdSources, Operation};
use ledgerguard_core::{AppError, Identity, UserId};
use ledgerguard_domain::RequestMetadata;
use serde_json::Value;

use crate::api_config::IdentityHeaders;
use crate::error::ApiResult;
use crate::state::AppState;

pub const BUSINESS_ID_HEADER: &str = "x-business-id";
pub const BUSINESS_ID_FIELD: &str = "businessId";

/// Attaches the gateway-verified identity and request attribution.
pub async fn require_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let identity = identity_from_headers(request.headers(), &state.identity_headers)?
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;
    let metadata = request_metadata(&request);

    request.extensions_mut().insert(identity);
    request.extensions_mut().insert(metadata);
    Ok(next.run(request).await)
}

/// Resolves the business context once and enforces the route's declared operation.
pub async fn authorize_business(
    State(state): State<AppState>,
    Extension(operation): Extension<Operation>,
    path_params: Result<RawPathParams, RawPathParamsRejection>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let path = path_params.ok().and_then(|params| {
        params
            .iter()
            .find(|(key, _)| *key == BUSINESS_ID_FIELD)
            .map(|(_, value)| value.to_owned())
    });
    let (mut request, sources) =
        collect_business_id_sources(request, path, state.business_body_limit_bytes).await?;

    let identity = request.extensions().get::<Identity>().cloned();
    let context = state
        .access_guard
        .authorize(identity.as_ref(), &sources, &operation)
        .await?;

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

fn identity_from_headers(
    headers: &HeaderMap,
    identity_headers: &IdentityHeaders,
) -> Result<Option<Identity>, AppError> {
    let Some(user_id) = header_value(headers, identity_headers.user_header.as_str()) else {
        return Ok(None);
    };
    let user_id = UserId::new(user_id)
        .map_err(|_| AppError::Unauthorized("authentication required".to_owned()))?;
    let is_superadmin = header_value(headers, identity_headers.superadmin_header.as_str())
        .is_some_and(|value| value.eq_ignore_ascii_case("true") || value == "1");

    Ok(Some(Identity::new(user_id, is_superadmin)))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn request_metadata(request: &Request) -> RequestMetadata {
    let forwarded_for = header_value(request.headers(), "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned);
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(address)| address.ip().to_string());

    RequestMetadata {
        ip_address: forwarded_for.or(peer),
        user_agent: header_value(request.headers(), header::USER_AGENT.as_str())
            .map(str::to_owned),
    }
}

/// Gathers business id candidates; the body is only buffered when header and
/// path are both absent.
async fn collect_business_id_sources(
    request: Request,
    path: Option<String>,
    body_limit: usize,
) -> ApiResult<(Request, BusinessIdSources)> {
    let header = header_value(request.headers(), BUSINESS_ID_HEADER).map(str::to_owned);
    let query = Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(mut params)| params.remove(BUSINESS_ID_FIELD));

    let (request, body) = if header.is_none() && path.is_none() && is_json(request.headers()) {
        let (parts, body) = request.into_parts();
        let bytes = axum::body::to_bytes(body, body_limit)
            .await
            .map_err(|error| {
                AppError::Validation(format!("failed to read request body: {error}"))
            })?;
        let field = serde_json::from_slice::<Value>(&bytes)
            .ok()
            .and_then(|value| {
                value
                    .get(BUSINESS_ID_FIELD)
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            });
        (Request::from_parts(parts, Body::from(bytes)), field)
    } else {
        (request, None)
    };

    Ok((
        request,
        BusinessIdSources {
            header,
            path,
            body,
            query,
        },
    ))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}
