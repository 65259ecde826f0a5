//! Authorization endpoint: parks the inbound request and bounces the
//! browser to the login page.

use std::sync::Arc;

use axum::extract::{Query, RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;

use crate::credentials::extract_basic_credentials;
use crate::session::{SessionEntry, SessionToken};
use crate::tenant::{ScopedTenant, TenantContext};
use crate::AppState;

/// Header carrying the tenant of the inbound request.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Inbound authorization request parameters.
///
/// Only the fields that drive the redirect decision are decoded; the full
/// query string is kept verbatim as the session payload.
#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    #[serde(default)]
    pub client_id: Option<String>,

    /// Where the client wants errors delivered, if registered
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// Space-separated requested scopes
    #[serde(default)]
    pub scope: Option<String>,

    /// `prompt=login` forces re-authentication at the login page
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Build the tenant context for this request. Each request gets its own
/// slot; interleaved requests can never observe or clear each other's
/// tenant.
pub(crate) fn request_tenant(headers: &HeaderMap) -> ScopedTenant {
    let tenant = ScopedTenant::new();
    if let Some(id) = headers.get(TENANT_HEADER).and_then(|v| v.to_str().ok()) {
        tenant.set(id);
    }
    tenant
}

/// Handler for `GET /oauth2/authorize`
pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
    Query(params): Query<AuthorizeRequest>,
) -> Response {
    // A confidential client may authenticate the request itself. A present
    // but undecodable header is an authentication failure, answered with
    // the realm challenge rather than a redirect.
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let decoded = auth_header
            .to_str()
            .ok()
            .map(extract_basic_credentials)
            .and_then(Result::ok);
        match decoded {
            Some(credentials) => {
                tracing::debug!(
                    "Basic credentials presented for client {}",
                    credentials.client_id
                );
            }
            None => {
                tracing::debug!("Rejecting undecodable Authorization header");
                return (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, state.config.realm_challenge())],
                    "Invalid client authentication",
                )
                    .into_response();
            }
        }
    }

    let tenant = request_tenant(&headers);

    let client_id = match params.client_id.as_deref() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            let built = state.redirects.error_page_url(
                "invalid_request",
                "client_id is required",
                None,
                params.redirect_uri.as_deref(),
                &tenant,
            );
            return Redirect::to(&built.url).into_response();
        }
    };

    let scopes: Vec<String> = params
        .scope
        .as_deref()
        .unwrap_or("")
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let force_authenticate = params.prompt.as_deref() == Some("login");

    // Park the original request under a fresh token; the login page hands
    // the token back when the user returns.
    let token = SessionToken::generate();
    let entry = SessionEntry {
        query_string: raw_query.unwrap_or_default(),
        tenant_id: tenant
            .tenant_id()
            .unwrap_or_else(|| state.config.default_tenant_id.clone()),
    };
    state.store.put(token.clone(), entry);

    match state.redirects.login_page_url(
        &client_id,
        &token,
        force_authenticate,
        false,
        &scopes,
        &tenant,
    ) {
        Ok(built) => {
            if !built.omitted.is_empty() {
                tracing::warn!("Login redirect built without parameters: {:?}", built.omitted);
            }
            Redirect::to(&built.url).into_response()
        }
        Err(err) => {
            tracing::warn!("Authorization flow for client {} failed: {}", client_id, err);
            let built = state.redirects.error_page_url(
                "server_error",
                "authorization request could not be processed",
                None,
                None,
                &tenant,
            );
            Redirect::to(&built.url).into_response()
        }
    }
}

/// Handler for `POST /oauth2/authorize`
pub async fn post_handler(
    state: State<Arc<AppState>>,
    headers: HeaderMap,
    raw_query: RawQuery,
    params: Query<AuthorizeRequest>,
) -> Response {
    get_handler(state, headers, raw_query, params).await
}
