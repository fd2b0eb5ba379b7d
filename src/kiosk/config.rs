//! Terminal configuration, read from `KIOSK_*` environment variables.

use crate::config::{nonzero, parse_var};
use anyhow::Result;
use std::env;
use std::time::Duration;

/// Settings of one kiosk terminal
#[derive(Debug, Clone)]
pub struct KioskConfig {
    /// Base URL of the check-in server
    pub server_url: String,
    /// Room this terminal stands in; decides which class scans count towards
    pub location: String,
    /// Scan as soon as the sixth digit is typed
    ///
    /// On by default, which suits terminals without a biometric reader. Turn it
    /// off where a platform authenticator is attached: with it on, a full code
    /// always takes the typed path and the biometric key never sees six digits.
    pub auto_submit: bool,
    pub success_reset: Duration,
    pub error_reset: Duration,
    /// Reset delay for input mistakes caught on the terminal itself
    pub validation_reset: Duration,
    pub request_timeout: Duration,
    /// Upper bound on the biometric prompt
    pub ceremony_timeout: Duration,
    pub schedule_refresh: Duration,
    pub clock_tick: Duration,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".to_string(),
            location: "Room 101".to_string(),
            auto_submit: true,
            success_reset: Duration::from_secs(5),
            error_reset: Duration::from_secs(5),
            validation_reset: Duration::from_secs(3),
            request_timeout: Duration::from_secs(15),
            ceremony_timeout: Duration::from_secs(60),
            schedule_refresh: Duration::from_secs(60),
            clock_tick: Duration::from_millis(1000),
        }
    }
}

impl KioskConfig {
    /// Load from the environment (and `.env`), falling back to [`KioskConfig::default`]
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = KioskConfig::default();
        let secs = |name: &str, default: Duration| -> Result<Duration> {
            Ok(Duration::from_secs(parse_var(name, default.as_secs())?))
        };

        Ok(KioskConfig {
            server_url: env::var("KIOSK_SERVER_URL").unwrap_or(defaults.server_url),
            location: env::var("KIOSK_LOCATION").unwrap_or(defaults.location),
            auto_submit: parse_var("KIOSK_AUTO_SUBMIT", defaults.auto_submit)?,
            success_reset: secs("KIOSK_SUCCESS_RESET_SECS", defaults.success_reset)?,
            error_reset: secs("KIOSK_ERROR_RESET_SECS", defaults.error_reset)?,
            validation_reset: secs("KIOSK_VALIDATION_RESET_SECS", defaults.validation_reset)?,
            request_timeout: secs("KIOSK_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            ceremony_timeout: secs("KIOSK_CEREMONY_TIMEOUT_SECS", defaults.ceremony_timeout)?,
            schedule_refresh: nonzero(
                "KIOSK_SCHEDULE_REFRESH_SECS",
                secs("KIOSK_SCHEDULE_REFRESH_SECS", defaults.schedule_refresh)?,
            )?,
            clock_tick: nonzero(
                "KIOSK_CLOCK_TICK_MILLIS",
                Duration::from_millis(parse_var(
                    "KIOSK_CLOCK_TICK_MILLIS",
                    defaults.clock_tick.as_millis() as u64,
                )?),
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_terminal_timings() {
        let config = KioskConfig::default();
        assert!(config.auto_submit);
        assert_eq!(config.success_reset, Duration::from_secs(5));
        assert_eq!(config.validation_reset, Duration::from_secs(3));
        assert!(config.request_timeout < config.ceremony_timeout);
    }

    #[test]
    fn test_zero_timer_periods_are_rejected() {
        env::set_var("KIOSK_CLOCK_TICK_MILLIS", "0");
        let err = KioskConfig::from_env().unwrap_err();
        env::remove_var("KIOSK_CLOCK_TICK_MILLIS");
        assert!(err.to_string().contains("KIOSK_CLOCK_TICK_MILLIS"));

        env::set_var("KIOSK_SCHEDULE_REFRESH_SECS", "0");
        let err = KioskConfig::from_env().unwrap_err();
        env::remove_var("KIOSK_SCHEDULE_REFRESH_SECS");
        assert!(err.to_string().contains("KIOSK_SCHEDULE_REFRESH_SECS"));
    }
}
