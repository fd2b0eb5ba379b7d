//! # Configuration Management
//!
//! This module handles loading server configuration from environment variables.
//! It uses the "12-factor app" methodology where configuration comes from the environment.
//!
//! ## Environment Variables
//! - `HOST`: Server bind address (default: 127.0.0.1)
//! - `PORT`: Server port (default: 8080)
//! - `DATABASE_URL`: SQLite database connection string
//! - `RP_ID`: WebAuthn Relying Party ID (usually your domain)
//! - `RP_ORIGIN`: WebAuthn Relying Party Origin (full URL)
//! - `RP_NAME`: Human-readable name for your service
//! - `CHALLENGE_TTL_SECS`: Lifetime of a pending ceremony challenge
//! - `CHALLENGE_SWEEP_SECS`: How often expired challenges are purged (must be non-zero)
//! - `SCHEDULE_GRACE_MINUTES`: How early/late a kiosk still accepts scans for a class
//! - `PASSKEY_MAX_FAILURES`, `PASSKEY_FAILURE_WINDOW_SECS`, `PASSKEY_LOCKOUT_SECS`:
//!   brute-force throttle on typed passkeys
//! - `SESSION_INACTIVITY_HOURS`: Self-service session expiry

use anyhow::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration
///
/// ## WebAuthn Terminology
/// - **RP (Relying Party)**: The check-in service that relies on authentication
/// - **RP ID**: Your domain name (e.g., "school.example" or "localhost")
/// - **RP Origin**: Full URL the kiosk front end is served from
///
/// The RP ID and origin must match the deployed origin exactly, otherwise every
/// biometric verification fails.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host/IP address to bind to
    pub host: String,

    /// Server port number
    pub port: u16,

    /// SQLite database connection URL
    /// Format: "sqlite:filename.db?mode=rwc"
    pub database_url: String,

    /// WebAuthn Relying Party ID
    pub rp_id: String,

    /// WebAuthn Relying Party Origin
    pub rp_origin: String,

    /// Human-readable name shown by the authenticator
    pub rp_name: String,

    /// How long a pending challenge may wait for its finish call
    pub challenge_ttl: Duration,

    /// Interval of the expired-challenge sweep
    pub challenge_sweep_interval: Duration,

    /// Scans are accepted this long before a class starts and after it ends
    pub schedule_grace: Duration,

    pub throttle: ThrottleConfig,

    pub session_inactivity_hours: i64,
}

/// Passkey lookup throttle settings
#[derive(Debug, Clone, Copy)]
pub struct ThrottleConfig {
    /// Consecutive failed lookups that trigger a lockout
    pub max_failures: u32,
    /// Failures older than this no longer count
    pub failure_window: Duration,
    /// How long a client stays locked out
    pub lockout: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            failure_window: Duration::from_secs(300),
            lockout: Duration::from_secs(900),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: "sqlite:kiosk.db?mode=rwc".to_string(),
            rp_id: "localhost".to_string(),
            rp_origin: "http://localhost:8080".to_string(),
            rp_name: "Kiosk Check-in".to_string(),
            challenge_ttl: Duration::from_secs(300),
            challenge_sweep_interval: Duration::from_secs(600),
            schedule_grace: Duration::from_secs(15 * 60),
            throttle: ThrottleConfig::default(),
            session_inactivity_hours: 24,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads variables from .env file (if present) using dotenvy
    /// 2. Reads each configuration value from environment
    /// 3. Falls back to the defaults of [`Config::default`] if variables aren't set
    /// 4. Returns an error if parsing fails (e.g., invalid port number)
    ///
    /// ## Example .env file
    /// ```text
    /// HOST=0.0.0.0
    /// PORT=8080
    /// DATABASE_URL=sqlite:kiosk.db?mode=rwc
    /// RP_ID=checkin.school.example
    /// RP_ORIGIN=https://checkin.school.example
    /// RP_NAME=Classroom Check-in
    /// PASSKEY_MAX_FAILURES=5
    /// ```
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        Ok(Config {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port)?,
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            rp_id: env::var("RP_ID").unwrap_or(defaults.rp_id),
            rp_origin: env::var("RP_ORIGIN").unwrap_or(defaults.rp_origin),
            rp_name: env::var("RP_NAME").unwrap_or(defaults.rp_name),
            challenge_ttl: Duration::from_secs(parse_var(
                "CHALLENGE_TTL_SECS",
                defaults.challenge_ttl.as_secs(),
            )?),
            challenge_sweep_interval: nonzero(
                "CHALLENGE_SWEEP_SECS",
                Duration::from_secs(parse_var(
                    "CHALLENGE_SWEEP_SECS",
                    defaults.challenge_sweep_interval.as_secs(),
                )?),
            )?,
            schedule_grace: Duration::from_secs(
                parse_var("SCHEDULE_GRACE_MINUTES", defaults.schedule_grace.as_secs() / 60)? * 60,
            ),
            throttle: ThrottleConfig {
                max_failures: parse_var("PASSKEY_MAX_FAILURES", defaults.throttle.max_failures)?,
                failure_window: Duration::from_secs(parse_var(
                    "PASSKEY_FAILURE_WINDOW_SECS",
                    defaults.throttle.failure_window.as_secs(),
                )?),
                lockout: Duration::from_secs(parse_var(
                    "PASSKEY_LOCKOUT_SECS",
                    defaults.throttle.lockout.as_secs(),
                )?),
            },
            session_inactivity_hours: parse_var(
                "SESSION_INACTIVITY_HOURS",
                defaults.session_inactivity_hours,
            )?,
        })
    }

    /// Get the socket address to bind the server to
    ///
    /// Example: "127.0.0.1:8080"
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read an environment variable and parse it, falling back to `default` when unset.
pub(crate) fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value for {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}

/// Refuse a zero period for settings that drive a timer
pub(crate) fn nonzero(name: &str, period: Duration) -> Result<Duration> {
    anyhow::ensure!(!period.is_zero(), "{} must be greater than zero", name);
    Ok(period)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.challenge_ttl, Duration::from_secs(300));
        assert_eq!(config.throttle.max_failures, 5);
    }

    #[test]
    fn test_parse_var_fallback_and_error() {
        assert_eq!(parse_var("KIOSK_TEST_UNSET_VARIABLE", 7u32).unwrap(), 7);

        env::set_var("KIOSK_TEST_BAD_PORT", "not-a-port");
        assert!(parse_var("KIOSK_TEST_BAD_PORT", 8080u16).is_err());

        env::set_var("KIOSK_TEST_GOOD_PORT", " 9090 ");
        assert_eq!(parse_var("KIOSK_TEST_GOOD_PORT", 8080u16).unwrap(), 9090);
    }

    #[test]
    fn test_zero_sweep_interval_is_rejected() {
        assert!(nonzero("X", Duration::from_millis(1)).is_ok());

        env::set_var("CHALLENGE_SWEEP_SECS", "0");
        let err = Config::from_env().unwrap_err();
        env::remove_var("CHALLENGE_SWEEP_SECS");
        assert!(err.to_string().contains("CHALLENGE_SWEEP_SECS"));
    }
}
