//! Consent redirect endpoint: resumes a parked flow after authentication
//! and bounces the browser to the right consent page.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;

use crate::handlers::authorize::request_tenant;
use crate::redirect::AuthorizationParameters;
use crate::session::SessionToken;
use crate::AppState;

/// Parameters handed back by the login subsystem. All fields are optional
/// at the extractor level so a malformed callback still ends in an
/// error-page redirect instead of a bare 400.
#[derive(Debug, Deserialize)]
pub struct ConsentRequest {
    #[serde(rename = "sessionDataKey")]
    #[serde(default)]
    pub session_data_key: Option<String>,

    /// Authenticated user identity
    #[serde(default)]
    pub user: Option<String>,

    /// Display name of the requesting application
    #[serde(default)]
    pub application: Option<String>,

    /// Space-separated scopes being approved
    #[serde(default)]
    pub scope: Option<String>,
}

/// Handler for `GET /oauth2/consent`
pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ConsentRequest>,
) -> Response {
    let tenant = request_tenant(&headers);

    let (session_data_key, user) = match (
        params.session_data_key.as_deref().filter(|s| !s.is_empty()),
        params.user.as_deref().filter(|s| !s.is_empty()),
    ) {
        (Some(key), Some(user)) => (key, user),
        _ => {
            tracing::warn!("Consent callback missing session key or user");
            let built = state.redirects.error_page_url(
                "invalid_request",
                "consent request is incomplete",
                None,
                None,
                &tenant,
            );
            return Redirect::to(&built.url).into_response();
        }
    };

    let token = SessionToken::from(session_data_key);
    let scopes: Vec<String> = params
        .scope
        .as_deref()
        .unwrap_or("")
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let is_oidc = scopes.iter().any(|s| s == "openid");

    let auth_params = AuthorizationParameters {
        application_name: params.application.clone().unwrap_or_default(),
        scopes,
        ..AuthorizationParameters::default()
    };

    match state
        .redirects
        .user_consent_url(&auth_params, user, &token, is_oidc, &tenant)
    {
        Ok(built) => {
            if !built.omitted.is_empty() {
                tracing::warn!(
                    "Consent redirect built without parameters: {:?}",
                    built.omitted
                );
            }
            Redirect::to(&built.url).into_response()
        }
        Err(err) => {
            // Generic code: whether the session expired or never existed is
            // not disclosed.
            tracing::warn!("Consent redirect failed: {}", err);
            let built = state.redirects.error_page_url(
                "access_denied",
                "authorization session is no longer valid",
                None,
                None,
                &tenant,
            );
            Redirect::to(&built.url).into_response()
        }
    }
}
