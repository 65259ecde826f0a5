//! OAuth2/OIDC authorization endpoint redirect service.
//!
//! Provides:
//! - session-bound carrying of authorization requests across redirects
//! - login, consent and error redirect URL construction
//! - Basic client credential extraction with realm challenges

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oauth_endpoint::config::EndpointConfig;
use oauth_endpoint::handlers;
use oauth_endpoint::redirect::RedirectUrlBuilder;
use oauth_endpoint::session::{InMemorySessionStore, SessionStore};
use oauth_endpoint::AppState;

#[derive(Parser, Debug)]
#[command(name = "oauth-endpoint")]
#[command(about = "OAuth2/OIDC authorization endpoint redirect service")]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = 9763, env = "ENDPOINT_PORT")]
    port: u16,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0", env = "ENDPOINT_BIND")]
    bind: String,

    /// Path to config directory
    #[arg(long, default_value = "/config", env = "ENDPOINT_CONFIG_PATH")]
    config_path: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oauth_endpoint=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = Arc::new(EndpointConfig::load(&cli.config_path)?);
    let store: Arc<dyn SessionStore> =
        Arc::new(InMemorySessionStore::new(config.session_ttl_secs));
    let redirects = RedirectUrlBuilder::new(config.clone(), store.clone());

    // Background eviction of expired authorization sessions
    let cleanup_store = store.clone();
    let cleanup_interval = config.cleanup_interval_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(cleanup_interval));
        loop {
            interval.tick().await;
            let evicted = cleanup_store.evict_expired();
            if evicted > 0 {
                tracing::info!("Evicted {} expired authorization sessions", evicted);
            }
        }
    });

    let state = Arc::new(AppState {
        config,
        store,
        redirects,
    });

    // Build router
    let app = Router::new()
        .route(
            "/oauth2/authorize",
            get(handlers::authorize::get_handler).post(handlers::authorize::post_handler),
        )
        .route("/oauth2/consent", get(handlers::consent::get_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Parse bind address
    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port).parse()?;

    tracing::info!("Starting oauth-endpoint on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("oauth-endpoint shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
