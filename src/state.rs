//! # Application State
//!
//! Shared state that's accessible to all request handlers.
//!
//! ## The State Pattern
//! Resources are created once at startup, stored in `AppState`, and Axum clones
//! the state for each request (cheap because everything inside is a pool or an
//! `Arc`).

use crate::config::Config;
use crate::db;
use crate::passkey::PasskeyThrottle;
use crate::schedule::{ScheduleResolver, SqlScheduleResolver};
use crate::webauthn::{CeremonyVerifier, WebauthnVerifier};
use anyhow::Result;
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;

/// Shared application state
///
/// - `db`: connection pool
/// - `verifier`: signs off on public-key ceremonies
/// - `schedules`: which class a kiosk location is checking into
/// - `throttle`: failed passkey lookups per client
/// - `config`: TTLs and relying-party settings read by handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub verifier: Arc<dyn CeremonyVerifier>,
    pub schedules: Arc<dyn ScheduleResolver>,
    pub throttle: Arc<PasskeyThrottle>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Initialize application state
    ///
    /// This function:
    /// 1. Connects to the SQLite database and runs migrations
    /// 2. Configures the relying party
    /// 3. Wires the SQL schedule resolver and the passkey throttle
    ///
    /// # Errors
    /// Returns an error if the database is unreachable, a migration fails, or
    /// the relying-party settings are invalid (e.g., malformed origin URL).
    pub async fn new(config: &Config) -> Result<Self> {
        let db = db::connect(&config.database_url).await?;
        let verifier = WebauthnVerifier::from_config(config)?;

        Ok(Self::from_parts(db, Arc::new(verifier), config.clone()))
    }

    /// Assemble state around an existing pool and verifier
    pub fn from_parts(db: SqlitePool, verifier: Arc<dyn CeremonyVerifier>, config: Config) -> Self {
        let schedules = Arc::new(SqlScheduleResolver::new(db.clone(), config.schedule_grace));
        let throttle = Arc::new(PasskeyThrottle::new(config.throttle));

        AppState {
            db,
            verifier,
            schedules,
            throttle,
            config: Arc::new(config),
        }
    }
}
