//! # Kiosk Check-in Server
//!
//! Serves the kiosk API, the self-service credential API and the kiosk web
//! front end from `static/`.

use kiosk_checkin::config::Config;
use kiosk_checkin::db::challenges;
use kiosk_checkin::state::AppState;
use std::net::SocketAddr;
use time::Duration;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main application entry point
///
/// 1. Sets up logging
/// 2. Loads configuration from the environment
/// 3. Connects the database and builds the relying party
/// 4. Starts the background sweep of expired challenges and stale throttle records
/// 5. Configures sessions and routes, then serves
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default: info for dependencies, debug for this crate; RUST_LOG overrides
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,kiosk_checkin=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded: {:?}", config);

    let app_state = AppState::new(&config).await?;
    tracing::info!("Application state initialized");

    let sweep_state = app_state.clone();
    let sweep_interval = config.challenge_sweep_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            match challenges::cleanup_expired_challenges(&sweep_state.db, chrono::Utc::now()).await {
                Ok(removed) => tracing::debug!(removed, "expired challenges swept"),
                Err(e) => tracing::error!("Challenge cleanup failed: {:?}", e),
            }
            sweep_state.throttle.sweep();
        }
    });

    // Session data lives server-side in SQLite; the cookie only carries its id
    let session_store = SqliteStore::new(app_state.db.clone());
    session_store.migrate().await?;

    let session_layer = SessionManagerLayer::new(session_store)
        .with_expiry(Expiry::OnInactivity(Duration::hours(config.session_inactivity_hours)));

    // Connection info feeds the per-terminal passkey throttle
    let app = kiosk_checkin::router(app_state, session_layer)
        .into_make_service_with_connect_info::<SocketAddr>();

    let bind_addr = config.bind_address();
    tracing::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
