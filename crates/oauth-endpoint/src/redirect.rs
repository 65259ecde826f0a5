//! Redirect URL construction for the authorization endpoint.
//!
//! Three outbound targets exist: the error page, the login page and the
//! consent page. Login and consent resume a suspended flow, so both start
//! with a session-store lookup; the error page is the terminal fallback and
//! must always be reachable, so its builder never fails. Every interpolated
//! value is percent-encoded, and user-visible values go through the
//! sanitizer first.

use std::sync::Arc;

use crate::config::EndpointConfig;
use crate::error::EndpointError;
use crate::sanitize::safe_text;
use crate::session::{SessionStore, SessionToken};
use crate::tenant::{TenantClearGuard, TenantContext};

/// Query parameter keys shared with the login and consent pages.
pub mod keys {
    pub const ERROR_CODE: &str = "oauthErrorCode";
    pub const ERROR_MESSAGE: &str = "oauthErrorMsg";
    /// Bare literal key, kept for compatibility with deployed pages.
    pub const APPLICATION: &str = "application";
    pub const SESSION_DATA_KEY: &str = "sessionDataKey";
    /// Consent-specific session key, distinct from [`SESSION_DATA_KEY`] so a
    /// login-stage token cannot be replayed at the consent stage.
    pub const SESSION_DATA_KEY_CONSENT: &str = "sessionDataKeyConsent";
    pub const LOGGED_IN_USER: &str = "loggedInUser";
    pub const SCOPE: &str = "scope";
    pub const SP_QUERY_PARAMS: &str = "spQueryParams";
    pub const FLOW_TYPE: &str = "type";
    pub const CALLER_PATH: &str = "commonAuthCallerPath";
    pub const FORCE_AUTHENTICATE: &str = "forceAuthenticate";
    pub const CHECK_AUTHENTICATION: &str = "checkAuthentication";
    pub const RELYING_PARTY: &str = "relyingParty";
    pub const TENANT_ID: &str = "tenantId";
    /// Flag label for the keyless query-string blob on the login URL.
    pub const QUERY_STRING: &str = "queryString";
}

/// Per-parameter percent-encoding charset.
///
/// Most parameters are UTF-8. The consent page's `application` and `scope`
/// parameters keep the legacy single-byte charset so the bytes placed in
/// already-deployed redirect URLs do not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamEncoding {
    Utf8,
    Latin1,
}

/// A redirect target plus the parameters left out because their values
/// could not be encoded. The URL itself is always usable: an omission never
/// aborts the redirect, it only loses that one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltUrl {
    pub url: String,
    pub omitted: Vec<&'static str>,
}

/// Decoded parameters of the current authorization step. Owned by the
/// caller; read-only here.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationParameters {
    pub client_id: String,
    pub application_name: String,
    pub response_type: String,
    pub redirect_uri: Option<String>,
    pub scopes: Vec<String>,
}

/// Builds the error, login and consent redirect URLs.
///
/// The page locations and the session store are injected at construction.
/// The tenant context is not: it belongs to one request, so each builder
/// call receives the caller's own context and clears it on exit, success or
/// failure. Contexts of other in-flight requests are never touched.
pub struct RedirectUrlBuilder {
    config: Arc<EndpointConfig>,
    store: Arc<dyn SessionStore>,
}

impl RedirectUrlBuilder {
    pub fn new(config: Arc<EndpointConfig>, store: Arc<dyn SessionStore>) -> Self {
        Self { config, store }
    }

    /// Build the error page redirect.
    ///
    /// A present, non-empty `redirect_uri` wins over the configured common
    /// error page. Never fails: the user must still reach some error page
    /// even if a parameter had to be dropped.
    pub fn error_page_url(
        &self,
        error_code: &str,
        error_message: &str,
        app_name: Option<&str>,
        redirect_uri: Option<&str>,
        tenant: &dyn TenantContext,
    ) -> BuiltUrl {
        let _guard = TenantClearGuard::new(tenant);

        let base = match redirect_uri {
            Some(uri) if !uri.is_empty() => uri,
            _ => self.config.error_page_url.as_str(),
        };

        let mut url = base.to_string();
        let mut first = true;
        let mut omitted = Vec::new();

        append_param(
            &mut url,
            &mut first,
            keys::ERROR_CODE,
            error_code,
            ParamEncoding::Utf8,
            &mut omitted,
        );
        append_param(
            &mut url,
            &mut first,
            keys::ERROR_MESSAGE,
            error_message,
            ParamEncoding::Utf8,
            &mut omitted,
        );
        if let Some(app_name) = app_name {
            append_param(
                &mut url,
                &mut first,
                keys::APPLICATION,
                app_name,
                ParamEncoding::Utf8,
                &mut omitted,
            );
        }

        BuiltUrl { url, omitted }
    }

    /// Build the login page redirect that resumes the flow after the user
    /// authenticates.
    ///
    /// The token must have been stored by the initiating request; an absent
    /// token is a fatal [`EndpointError::SessionNotFound`]. The caller's
    /// tenant context is read once and cleared on every exit path.
    pub fn login_page_url(
        &self,
        client_id: &str,
        token: &SessionToken,
        force_authenticate: bool,
        check_authentication: bool,
        scopes: &[String],
        tenant: &dyn TenantContext,
    ) -> Result<BuiltUrl, EndpointError> {
        let guard = TenantClearGuard::new(tenant);

        let entry = self
            .store
            .get(token)
            .ok_or(EndpointError::SessionNotFound)?;

        let flow_type = if scopes.iter().any(|s| s == "openid") {
            "oidc"
        } else {
            "oauth2"
        };
        let tenant_id = guard
            .tenant_id()
            .unwrap_or_else(|| self.config.default_tenant_id.clone());

        let mut url = self.config.common_auth_url.clone();
        let mut first = true;
        let mut omitted = Vec::new();

        append_param(
            &mut url,
            &mut first,
            keys::SESSION_DATA_KEY,
            token.as_str(),
            ParamEncoding::Utf8,
            &mut omitted,
        );
        append_param(
            &mut url,
            &mut first,
            keys::FLOW_TYPE,
            flow_type,
            ParamEncoding::Utf8,
            &mut omitted,
        );
        append_param(
            &mut url,
            &mut first,
            keys::CALLER_PATH,
            &self.config.self_path,
            ParamEncoding::Utf8,
            &mut omitted,
        );
        append_param(
            &mut url,
            &mut first,
            keys::FORCE_AUTHENTICATE,
            if force_authenticate { "true" } else { "false" },
            ParamEncoding::Utf8,
            &mut omitted,
        );
        append_param(
            &mut url,
            &mut first,
            keys::CHECK_AUTHENTICATION,
            if check_authentication { "true" } else { "false" },
            ParamEncoding::Utf8,
            &mut omitted,
        );
        append_param(
            &mut url,
            &mut first,
            keys::RELYING_PARTY,
            client_id,
            ParamEncoding::Utf8,
            &mut omitted,
        );
        append_param(
            &mut url,
            &mut first,
            keys::TENANT_ID,
            &tenant_id,
            ParamEncoding::Utf8,
            &mut omitted,
        );

        // The original request's query string rides along as one
        // already-encoded trailing blob, without a key.
        match percent_encode(&entry.query_string, ParamEncoding::Utf8) {
            Some(encoded) => {
                url.push('&');
                url.push_str(&encoded);
            }
            None => omitted.push(keys::QUERY_STRING),
        }

        Ok(BuiltUrl { url, omitted })
    }

    /// Build the consent page redirect shown after authentication.
    ///
    /// The consent page differs by flow kind; the session token travels
    /// under the consent-specific key. Same missing-token policy as
    /// [`Self::login_page_url`].
    pub fn user_consent_url(
        &self,
        params: &AuthorizationParameters,
        logged_in_user: &str,
        token: &SessionToken,
        is_oidc: bool,
        tenant: &dyn TenantContext,
    ) -> Result<BuiltUrl, EndpointError> {
        let _guard = TenantClearGuard::new(tenant);

        let entry = self
            .store
            .get(token)
            .ok_or(EndpointError::SessionNotFound)?;

        let base = if is_oidc {
            &self.config.oidc_consent_url
        } else {
            &self.config.oauth2_consent_url
        };

        let mut url = base.clone();
        let mut first = true;
        let mut omitted = Vec::new();

        append_param(
            &mut url,
            &mut first,
            keys::LOGGED_IN_USER,
            &safe_text(logged_in_user),
            ParamEncoding::Utf8,
            &mut omitted,
        );
        append_param(
            &mut url,
            &mut first,
            keys::APPLICATION,
            &safe_text(&params.application_name),
            ParamEncoding::Latin1,
            &mut omitted,
        );
        append_param(
            &mut url,
            &mut first,
            keys::SCOPE,
            &joined_scopes(params),
            ParamEncoding::Latin1,
            &mut omitted,
        );
        append_param(
            &mut url,
            &mut first,
            keys::SESSION_DATA_KEY_CONSENT,
            token.as_str(),
            ParamEncoding::Utf8,
            &mut omitted,
        );
        append_param(
            &mut url,
            &mut first,
            keys::SP_QUERY_PARAMS,
            &entry.query_string,
            ParamEncoding::Utf8,
            &mut omitted,
        );

        Ok(BuiltUrl { url, omitted })
    }
}

/// Space-joined scope list, each scope sanitized individually before
/// joining. An empty scope set yields an empty string, not an absent
/// parameter.
fn joined_scopes(params: &AuthorizationParameters) -> String {
    let mut scopes = String::new();
    for scope in &params.scopes {
        scopes.push_str(&safe_text(scope));
        scopes.push(' ');
    }
    scopes.trim_end().to_string()
}

/// Append `key=<encoded value>` to the URL, or flag the key as omitted when
/// the value cannot be represented in the chosen charset.
fn append_param(
    url: &mut String,
    first: &mut bool,
    key: &'static str,
    value: &str,
    encoding: ParamEncoding,
    omitted: &mut Vec<&'static str>,
) {
    match percent_encode(value, encoding) {
        Some(encoded) => {
            url.push(if *first { '?' } else { '&' });
            *first = false;
            url.push_str(key);
            url.push('=');
            url.push_str(&encoded);
        }
        None => omitted.push(key),
    }
}

/// Form-style percent-encoding in the requested charset. `None` when the
/// value contains characters the charset cannot represent.
fn percent_encode(value: &str, encoding: ParamEncoding) -> Option<String> {
    match encoding {
        ParamEncoding::Utf8 => {
            Some(url::form_urlencoded::byte_serialize(value.as_bytes()).collect())
        }
        ParamEncoding::Latin1 => {
            let mut bytes = Vec::with_capacity(value.len());
            for ch in value.chars() {
                let code = ch as u32;
                if code > 0xFF {
                    return None;
                }
                bytes.push(code as u8);
            }
            Some(url::form_urlencoded::byte_serialize(&bytes).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::session::{InMemorySessionStore, SessionEntry};
    use crate::tenant::ScopedTenant;

    /// Tenant-context double that records whether `clear` was called.
    #[derive(Default)]
    struct RecordingTenant {
        cleared: AtomicBool,
    }

    impl TenantContext for RecordingTenant {
        fn tenant_id(&self) -> Option<String> {
            Some("7".to_string())
        }

        fn set(&self, _tenant_id: &str) {}

        fn clear(&self) {
            self.cleared.store(true, Ordering::SeqCst);
        }
    }

    fn builder_with(store: Arc<dyn SessionStore>) -> RedirectUrlBuilder {
        RedirectUrlBuilder::new(Arc::new(EndpointConfig::default()), store)
    }

    fn builder() -> RedirectUrlBuilder {
        builder_with(Arc::new(InMemorySessionStore::new(600)))
    }

    fn stored_token(store: &dyn SessionStore, query_string: &str) -> SessionToken {
        let token = SessionToken::generate();
        store.put(
            token.clone(),
            SessionEntry {
                query_string: query_string.to_string(),
                tenant_id: "acme".to_string(),
            },
        );
        token
    }

    #[test]
    fn test_error_url_uses_default_page_and_encodes_params() {
        let built = builder().error_page_url(
            "invalid_request",
            "bad scope value",
            None,
            None,
            &ScopedTenant::new(),
        );

        assert!(built
            .url
            .starts_with("https://localhost:9443/authenticationendpoint/oauth2_error.do?"));
        assert!(built.url.contains("oauthErrorCode=invalid_request"));
        assert!(built.url.contains("oauthErrorMsg=bad+scope+value"));
        assert!(!built.url.contains("application="));
        assert!(built.omitted.is_empty());
    }

    #[test]
    fn test_error_url_prefers_explicit_redirect_uri() {
        let built = builder().error_page_url(
            "server_error",
            "boom",
            None,
            Some("https://client.example.com/cb"),
            &ScopedTenant::new(),
        );
        assert!(built.url.starts_with("https://client.example.com/cb?"));

        // Empty string falls back to the common page
        let built =
            builder().error_page_url("server_error", "boom", None, Some(""), &ScopedTenant::new());
        assert!(built.url.contains("oauth2_error.do"));
    }

    #[test]
    fn test_error_url_app_name_cannot_inject_headers() {
        let built =
            builder().error_page_url("code", "msg", Some("Accept: a"), None, &ScopedTenant::new());
        assert!(built.url.contains("application=Accept%3A+a"));
        assert!(!built.url.contains("Accept: a"));
    }

    #[test]
    fn test_login_url_flow_type_discriminator() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(600));
        let builder = builder_with(store.clone());
        let token = stored_token(store.as_ref(), "foo=bar");

        let openid = vec!["openid".to_string(), "profile".to_string()];
        let built = builder
            .login_page_url("client1", &token, false, true, &openid, &ScopedTenant::new())
            .unwrap();
        assert!(built.url.contains("type=oidc"));

        let built = builder
            .login_page_url("client1", &token, false, true, &[], &ScopedTenant::new())
            .unwrap();
        assert!(built.url.contains("type=oauth2"));
    }

    #[test]
    fn test_login_url_carries_flow_parameters() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(600));
        let builder = builder_with(store.clone());
        let token = stored_token(store.as_ref(), "foo=bar&baz=1");

        let tenant = ScopedTenant::new();
        tenant.set("42");
        let built = builder
            .login_page_url("client1", &token, true, false, &[], &tenant)
            .unwrap();

        assert!(built.url.starts_with("https://localhost:9443/commonauth?"));
        assert!(built
            .url
            .contains(&format!("sessionDataKey={}", token.as_str())));
        assert!(built.url.contains("commonAuthCallerPath=%2Foauth2%2Fauthorize"));
        assert!(built.url.contains("forceAuthenticate=true"));
        assert!(built.url.contains("checkAuthentication=false"));
        assert!(built.url.contains("relyingParty=client1"));
        assert!(built.url.contains("tenantId=42"));
    }

    #[test]
    fn test_login_url_tenant_defaults_when_context_unset() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(600));
        let builder = builder_with(store.clone());
        let token = stored_token(store.as_ref(), "foo=bar");

        let built = builder
            .login_page_url("client1", &token, false, false, &[], &ScopedTenant::new())
            .unwrap();
        assert!(built.url.contains("tenantId=-1234"));
    }

    #[test]
    fn test_login_url_unknown_token_is_session_not_found() {
        let err = builder()
            .login_page_url(
                "client1",
                &SessionToken::generate(),
                false,
                false,
                &[],
                &ScopedTenant::new(),
            )
            .unwrap_err();
        assert!(matches!(err, EndpointError::SessionNotFound));
    }

    #[test]
    fn test_consent_url_unknown_token_is_session_not_found() {
        let err = builder()
            .user_consent_url(
                &AuthorizationParameters::default(),
                "alice",
                &SessionToken::generate(),
                true,
                &ScopedTenant::new(),
            )
            .unwrap_err();
        assert!(matches!(err, EndpointError::SessionNotFound));
    }

    #[test]
    fn test_query_string_round_trips_exactly_once() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(600));
        let builder = builder_with(store.clone());
        let token = stored_token(store.as_ref(), "foo=bar&baz=1");
        let encoded = "foo%3Dbar%26baz%3D1";

        let login = builder
            .login_page_url("client1", &token, false, false, &[], &ScopedTenant::new())
            .unwrap();
        assert_eq!(login.url.matches(encoded).count(), 1);

        let consent = builder
            .user_consent_url(
                &AuthorizationParameters::default(),
                "alice",
                &token,
                false,
                &ScopedTenant::new(),
            )
            .unwrap();
        assert_eq!(consent.url.matches(encoded).count(), 1);
        assert!(consent.url.contains(&format!("spQueryParams={encoded}")));
    }

    #[test]
    fn test_consent_url_page_differs_by_flow_kind() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(600));
        let builder = builder_with(store.clone());
        let token = stored_token(store.as_ref(), "a=1");
        let params = AuthorizationParameters::default();

        let oidc = builder
            .user_consent_url(&params, "alice", &token, true, &ScopedTenant::new())
            .unwrap();
        assert!(oidc.url.contains("oauth2_consent.do"));

        let oauth2 = builder
            .user_consent_url(&params, "alice", &token, false, &ScopedTenant::new())
            .unwrap();
        assert!(oauth2.url.contains("oauth2_authz.do"));
    }

    #[test]
    fn test_consent_url_sanitizes_user_and_application() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(600));
        let builder = builder_with(store.clone());
        let token = stored_token(store.as_ref(), "a=1");
        let params = AuthorizationParameters {
            application_name: "<My App>".to_string(),
            ..AuthorizationParameters::default()
        };

        let built = builder
            .user_consent_url(&params, "<alice>", &token, true, &ScopedTenant::new())
            .unwrap();
        assert!(!built.url.contains('<'));
        assert!(!built.url.contains('>'));
        // Entity forms survive, percent-encoded
        assert!(built.url.contains("loggedInUser=%26lt%3Balice%26gt%3B"));
        assert!(built.url.contains("application=%26lt%3BMy+App%26gt%3B"));
    }

    #[test]
    fn test_consent_url_scope_joining() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(600));
        let builder = builder_with(store.clone());
        let token = stored_token(store.as_ref(), "a=1");

        let params = AuthorizationParameters {
            scopes: vec!["openid".to_string(), "profile".to_string()],
            ..AuthorizationParameters::default()
        };
        let built = builder
            .user_consent_url(&params, "alice", &token, true, &ScopedTenant::new())
            .unwrap();
        assert!(built.url.contains("scope=openid+profile"));

        // Empty scope set still yields the parameter, with an empty value
        let built = builder
            .user_consent_url(
                &AuthorizationParameters::default(),
                "alice",
                &token,
                true,
                &ScopedTenant::new(),
            )
            .unwrap();
        assert!(built.url.contains("scope=&"));
    }

    #[test]
    fn test_consent_url_latin1_parameters() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(600));
        let builder = builder_with(store.clone());
        let token = stored_token(store.as_ref(), "a=1");

        // Representable in the legacy charset: encoded as a single byte
        let params = AuthorizationParameters {
            application_name: "café".to_string(),
            ..AuthorizationParameters::default()
        };
        let built = builder
            .user_consent_url(&params, "alice", &token, false, &ScopedTenant::new())
            .unwrap();
        assert!(built.url.contains("application=caf%E9"));
        assert!(built.omitted.is_empty());

        // Not representable: flagged omission, redirect still built
        let params = AuthorizationParameters {
            application_name: "日本語アプリ".to_string(),
            ..AuthorizationParameters::default()
        };
        let built = builder
            .user_consent_url(&params, "alice", &token, false, &ScopedTenant::new())
            .unwrap();
        assert!(!built.url.contains("application="));
        assert_eq!(built.omitted, vec![keys::APPLICATION]);
        assert!(built.url.contains("sessionDataKeyConsent="));
    }

    #[test]
    fn test_every_builder_clears_the_tenant_context() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(600));
        let builder = builder_with(store.clone());
        let token = stored_token(store.as_ref(), "a=1");

        // Success paths
        for call in 0..3 {
            let tenant = RecordingTenant::default();
            match call {
                0 => {
                    builder.error_page_url("code", "msg", None, None, &tenant);
                }
                1 => {
                    builder
                        .login_page_url("client1", &token, false, false, &[], &tenant)
                        .unwrap();
                }
                _ => {
                    builder
                        .user_consent_url(
                            &AuthorizationParameters::default(),
                            "alice",
                            &token,
                            true,
                            &tenant,
                        )
                        .unwrap();
                }
            }
            assert!(tenant.cleared.load(Ordering::SeqCst), "call {call} leaked");
        }

        // Failure path: lookup miss must still clear
        let tenant = RecordingTenant::default();
        assert!(builder
            .login_page_url(
                "client1",
                &SessionToken::generate(),
                false,
                false,
                &[],
                &tenant,
            )
            .is_err());
        assert!(tenant.cleared.load(Ordering::SeqCst));
    }

    #[test]
    fn test_interleaved_requests_keep_tenant_contexts_isolated() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(600));
        let builder = builder_with(store.clone());
        let token_a = stored_token(store.as_ref(), "a=1");
        let token_b = stored_token(store.as_ref(), "b=1");

        // Two in-flight requests, each with its own context, set before
        // either builds its URL
        let tenant_a = ScopedTenant::new();
        let tenant_b = ScopedTenant::new();
        tenant_a.set("tenant-a");
        tenant_b.set("tenant-b");

        let url_a = builder
            .login_page_url("client-a", &token_a, false, false, &[], &tenant_a)
            .unwrap()
            .url;
        // A's call cleared only A's context
        assert_eq!(tenant_a.tenant_id(), None);
        assert_eq!(tenant_b.tenant_id(), Some("tenant-b".to_string()));

        let url_b = builder
            .login_page_url("client-b", &token_b, false, false, &[], &tenant_b)
            .unwrap()
            .url;

        assert!(url_a.contains("tenantId=tenant-a"));
        assert!(!url_a.contains("tenantId=tenant-b"));
        assert!(url_b.contains("tenantId=tenant-b"));
    }
}
