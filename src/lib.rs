//! # Kiosk Check-in
//!
//! Classroom attendance from a shared terminal. A student types their 6-digit
//! passkey and is checked in or out of the class running at the kiosk's
//! location, optionally confirming with a biometric credential.
//!
//! ## Layout
//! - Server side: [`passkey`] (weak lookup and its throttle), [`webauthn`]
//!   (public-key ceremonies), [`attendance`] (the ENTRY/EXIT toggle),
//!   [`schedule`] (which class a location is on), [`handlers`] and [`router`]
//! - Terminal side: [`kiosk`] (state machine, server client, tickers)

pub mod attendance;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod kiosk;
pub mod middleware;
pub mod passkey;
pub mod schedule;
pub mod state;
pub mod webauthn;

use crate::handlers::{auth, credentials, health, kiosk as kiosk_handlers};
use crate::middleware::{auth::require_student, client::client_address};
use crate::state::AppState;
use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

/// Build the HTTP application
///
/// The session store is a parameter so the server can use SQLite and tests an
/// in-memory store.
pub fn router<S>(state: AppState, session_layer: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    // Kiosks are served from their own origin in some deployments
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let kiosk_routes = Router::new()
        .route("/api/kiosk/scan", post(kiosk_handlers::scan))
        .route("/api/kiosk/authenticate/start", post(kiosk_handlers::authenticate_start))
        .route("/api/kiosk/authenticate/finish", post(kiosk_handlers::authenticate_finish))
        .route("/api/kiosk/schedule", get(kiosk_handlers::current_schedule))
        .layer(axum_middleware::from_fn(client_address));

    let self_service_routes = Router::new()
        .route("/api/me/credentials", get(credentials::list_credentials))
        .route("/api/me/credentials/register/start", post(credentials::register_start))
        .route("/api/me/credentials/register/finish", post(credentials::register_finish))
        .route("/api/me/credentials/{id}", delete(credentials::delete_credential))
        .route("/api/me/passkey", get(credentials::get_passkey))
        .route("/api/me/passkey/regenerate", post(credentials::regenerate_passkey))
        .layer(axum_middleware::from_fn(require_student));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/auth/session", get(auth::session_info))
        .route("/api/auth/logout", post(auth::logout))
        .merge(kiosk_routes)
        .merge(self_service_routes)
        // Kiosk web front end
        .fallback_service(ServeDir::new("static"))
        .layer(session_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
