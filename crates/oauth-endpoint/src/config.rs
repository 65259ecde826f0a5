//! Endpoint configuration: page locations, realm hostname, session expiry.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the authorization endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Common error page used when the request carries no usable
    /// redirect_uri of its own
    #[serde(default = "default_error_page_url")]
    pub error_page_url: String,

    /// Common authentication (login) endpoint
    #[serde(default = "default_common_auth_url")]
    pub common_auth_url: String,

    /// Consent page for OIDC flows
    #[serde(default = "default_oidc_consent_url")]
    pub oidc_consent_url: String,

    /// Consent page for plain OAuth2 flows
    #[serde(default = "default_oauth2_consent_url")]
    pub oauth2_consent_url: String,

    /// Path of the authorization endpoint itself, echoed to the login page
    /// as the callback path
    #[serde(default = "default_self_path")]
    pub self_path: String,

    /// Hostname advertised in the Basic realm challenge
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// How long a suspended authorization attempt stays resumable, in
    /// seconds
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// How often expired sessions are evicted, in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Tenant id reported when no tenant context has been set
    #[serde(default = "default_tenant_id")]
    pub default_tenant_id: String,
}

fn default_error_page_url() -> String {
    "https://localhost:9443/authenticationendpoint/oauth2_error.do".to_string()
}

fn default_common_auth_url() -> String {
    "https://localhost:9443/commonauth".to_string()
}

fn default_oidc_consent_url() -> String {
    "https://localhost:9443/authenticationendpoint/oauth2_consent.do".to_string()
}

fn default_oauth2_consent_url() -> String {
    "https://localhost:9443/authenticationendpoint/oauth2_authz.do".to_string()
}

fn default_self_path() -> String {
    "/oauth2/authorize".to_string()
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_session_ttl() -> u64 {
    600 // 10 minutes
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_tenant_id() -> String {
    crate::tenant::DEFAULT_TENANT_ID.to_string()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            error_page_url: default_error_page_url(),
            common_auth_url: default_common_auth_url(),
            oidc_consent_url: default_oidc_consent_url(),
            oauth2_consent_url: default_oauth2_consent_url(),
            self_path: default_self_path(),
            hostname: default_hostname(),
            session_ttl_secs: default_session_ttl(),
            cleanup_interval_secs: default_cleanup_interval(),
            default_tenant_id: default_tenant_id(),
        }
    }
}

impl EndpointConfig {
    /// Load configuration from the config directory.
    pub fn load(config_path: &str) -> Result<Self> {
        let config_file = Path::new(config_path).join("config.json");

        if config_file.exists() {
            let content = std::fs::read_to_string(&config_file)
                .with_context(|| format!("Failed to read config file: {:?}", config_file))?;
            let config: EndpointConfig =
                serde_json::from_str(&content).with_context(|| "Failed to parse config.json")?;
            tracing::info!("Loaded configuration from {:?}", config_file);
            Ok(config)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_file);
            let config = EndpointConfig::default();

            std::fs::create_dir_all(config_path)
                .with_context(|| format!("Failed to create config directory: {}", config_path))?;

            // Write default config for reference
            let content = serde_json::to_string_pretty(&config)?;
            std::fs::write(&config_file, content)
                .with_context(|| format!("Failed to write default config: {:?}", config_file))?;
            tracing::info!("Created default config at {:?}", config_file);

            Ok(config)
        }
    }

    /// `WWW-Authenticate` challenge value for failed client authentication.
    pub fn realm_challenge(&self) -> String {
        format!("Basic realm=\"{}\"", self.hostname)
    }
}
