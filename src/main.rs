use std::sync::Arc;

use anyhow::Context;
use chatlists::{AppState, auth, config::Config, store::SqliteStore};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,chatlists=debug,tower_http=debug")),
        )
        .init();

    let config = Config::from_env()?;
    info!(bind = %config.bind_addr, database = %config.database_url, "starting chatlists");

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(config.secure_cookies)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            config.session_inactivity_minutes,
        )));

    let store = SqliteStore::connect(&config.database_url, config.max_connections)
        .await
        .with_context(|| format!("opening {}", config.database_url))?;

    let clients = match &config.oauth_clients {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let json: serde_json::Value = serde_json::from_str(&json)?;
            auth::Clients::from_json(&json, &config.public_url).map_err(|e| e.0)?
        }
        None => auth::Clients::default(),
    };
    info!(providers = ?clients.configured(), "federated sign-in");

    let app_state = AppState {
        store: Arc::new(store),
        identity: Arc::new(config.identity(reqwest::Client::new())),
        clients,
    };

    let app = chatlists::router(app_state).layer(session_layer);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("received Ctrl+C, shutting down");
        })
        .await?;

    Ok(())
}
