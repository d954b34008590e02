use anyhow::{Context, Result};
use beacon::api::{create_app, AdminAppState, WsAppState};
use beacon::config::load_or_default;
use beacon::hub::Hub;
use beacon::session::SessionRegistry;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacon=info".into()),
        )
        .init();

    info!("Beacon starting...");

    let config_path = std::env::var("BEACON_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = load_or_default(&config_path)?;

    if config.auth.admin_token.is_none() {
        warn!("No admin token configured, admin endpoints are unrestricted");
    }

    let hub = Hub::spawn(&config.hub);
    let sessions = SessionRegistry::new();

    let app = create_app(
        WsAppState {
            hub: hub.clone(),
            sessions: sessions.clone(),
            hub_config: config.hub.clone(),
            websocket: config.websocket.clone(),
            auth_enabled: config.auth.enabled,
        },
        AdminAppState {
            hub,
            sessions,
            admin_token: config.auth.admin_token.clone(),
        },
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;
    info!(
        addr = %config.server.bind_addr,
        auth_enabled = config.auth.enabled,
        "Beacon listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Beacon stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install ctrl-c handler");
    }
}
