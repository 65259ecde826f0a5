//! OAuth2/OIDC authorization endpoint redirect coordination.
//!
//! An authorization request arrives once, but the browser bounces through
//! login and consent pages before the flow completes. This crate carries
//! the suspended request across those redirects: the original query string
//! is parked in a token-keyed session store, and every outbound URL (login,
//! consent, error) is rebuilt from that store with sanitized,
//! percent-encoded parameters. Client credentials arriving by HTTP Basic
//! auth are decoded here too, with a realm challenge for failures.

pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod redirect;
pub mod sanitize;
pub mod session;
pub mod tenant;

use std::sync::Arc;

use crate::config::EndpointConfig;
use crate::redirect::RedirectUrlBuilder;
use crate::session::SessionStore;

/// Shared application state. Tenant context is deliberately absent: it is
/// request-scoped and constructed per request by the handlers.
pub struct AppState {
    pub config: Arc<EndpointConfig>,
    pub store: Arc<dyn SessionStore>,
    pub redirects: RedirectUrlBuilder,
}
