//! PaySwarm registration HTTP host
//!
//! Axum server exposing the site's PaySwarm registration endpoint:
//! a GET starts the handshake, the authority's POST completes it.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payswarm_registration::{
    FileSettingsStore, MemorySettingsStore, Registrar, RegistrarConfig, SettingsStore,
};

use crate::handlers::{
    begin_registration, get_keys, health_check, registration_callback, registration_status,
    set_pricing,
};
use crate::state::AppState;

fn app(state: AppState) -> Router {
    let callback_path = state.registrar.config().callback_url.path().to_string();

    Router::new()
        .route("/health", get(health_check))
        .route(&callback_path, get(begin_registration).post(registration_callback))
        .route("/payswarm/keys", get(get_keys))
        .route("/payswarm/status", get(registration_status))
        .route("/payswarm/pricing", post(set_pricing))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RegistrarConfig::from_env()?;

    let store: Arc<dyn SettingsStore> = match std::env::var("PAYSWARM_SETTINGS_PATH") {
        Ok(path) => {
            tracing::info!("Settings stored in {}", path);
            Arc::new(FileSettingsStore::new(path))
        }
        Err(_) => {
            tracing::warn!("PAYSWARM_SETTINGS_PATH not set - settings are kept in memory only");
            Arc::new(MemorySettingsStore::new())
        }
    };

    if config.registration_url.is_none() {
        tracing::warn!("PAYSWARM_REGISTRATION_URL not set - registration needs a stored authority URL");
    }

    let callback_url = config.callback_url.clone();
    let state = AppState {
        registrar: Arc::new(Registrar::new(config, store)),
    };

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("payswarm-server running on http://{}", addr);
    tracing::info!("  GET  {}  - Start registration", callback_url.path());
    tracing::info!("  POST {}  - Authority callback", callback_url.path());
    tracing::info!("  GET  /payswarm/keys     - Site public key");
    tracing::info!("  GET  /payswarm/status   - Stored registration");
    tracing::info!("  POST /payswarm/pricing  - Default price and authorization rate");

    axum::serve(listener, app(state)).await?;

    Ok(())
}
