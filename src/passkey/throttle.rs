//! Brute-force protection for typed passkeys
//!
//! A passkey is only six digits, so a client that keeps guessing must be
//! stopped. Failures are counted per client inside a fixed window opened by the
//! first failure; reaching the limit locks that client out for a fixed period,
//! during which every lookup is refused, correct code or not.
//!
//! A lookup reserves its attempt with [`PasskeyThrottle::begin`] before the
//! store is consulted. Lookups still in flight count against the limit, so
//! parallel guesses from one client cannot slip past it.

use crate::config::ThrottleConfig;
use crate::error::{AppError, AppResult};
use dashmap::DashMap;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct FailureRecord {
    failures: u32,
    in_flight: u32,
    window_started: Instant,
    locked_until: Option<Instant>,
}

impl FailureRecord {
    fn fresh(now: Instant) -> Self {
        Self {
            failures: 0,
            in_flight: 0,
            window_started: now,
            locked_until: None,
        }
    }

    /// Forget failures whose window or lockout has lapsed
    fn roll_over(&mut self, now: Instant, window: std::time::Duration) {
        let lockout_lapsed = self.locked_until.is_some_and(|until| until <= now);
        let window_lapsed = now.duration_since(self.window_started) > window;
        if lockout_lapsed || window_lapsed {
            *self = FailureRecord {
                in_flight: self.in_flight,
                ..FailureRecord::fresh(now)
            };
        }
    }
}

/// Per-client failed-lookup bookkeeping
#[derive(Debug)]
pub struct PasskeyThrottle {
    config: ThrottleConfig,
    clients: DashMap<String, FailureRecord>,
}

/// A reserved lookup, settled with [`LookupAttempt::succeeded`] or
/// [`LookupAttempt::failed`]
///
/// Dropping it unsettled (a store error) releases the reservation without
/// counting a failure.
#[must_use]
#[derive(Debug)]
pub struct LookupAttempt<'a> {
    throttle: &'a PasskeyThrottle,
    client: String,
    settled: bool,
}

impl PasskeyThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            clients: DashMap::new(),
        }
    }

    /// Reserve a lookup for `client`, or refuse it
    ///
    /// Refused while the client is locked out, and while its recorded failures
    /// plus lookups in flight already reach the limit.
    pub fn begin(&self, client: &str) -> AppResult<LookupAttempt<'_>> {
        let now = Instant::now();
        let mut entry = self
            .clients
            .entry(client.to_string())
            .or_insert_with(|| FailureRecord::fresh(now));
        let record = entry.value_mut();

        if let Some(until) = record.locked_until {
            if until > now {
                return Err(AppError::RateLimited {
                    retry_after_secs: until.duration_since(now).as_secs().max(1),
                });
            }
        }
        record.roll_over(now, self.config.failure_window);

        if record.failures + record.in_flight >= self.config.max_failures {
            tracing::debug!(client, in_flight = record.in_flight, "passkey lookup refused while others settle");
            return Err(AppError::RateLimited { retry_after_secs: 1 });
        }

        record.in_flight += 1;
        Ok(LookupAttempt {
            throttle: self,
            client: client.to_string(),
            settled: false,
        })
    }

    /// Returns `true` if this failure started a lockout
    fn record_failure(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut entry = self
            .clients
            .entry(client.to_string())
            .or_insert_with(|| FailureRecord::fresh(now));
        let record = entry.value_mut();

        record.in_flight = record.in_flight.saturating_sub(1);
        record.roll_over(now, self.config.failure_window);

        record.failures += 1;
        if record.failures >= self.config.max_failures && record.locked_until.is_none() {
            record.locked_until = Some(now + self.config.lockout);
            tracing::warn!(
                client,
                failures = record.failures,
                lockout_secs = self.config.lockout.as_secs(),
                "passkey lookups locked out"
            );
            return true;
        }

        false
    }

    /// A successful lookup wipes the client's failures
    fn record_success(&self, client: &str) {
        let now = Instant::now();
        self.clients.remove_if_mut(client, |_, record| {
            record.in_flight = record.in_flight.saturating_sub(1);
            *record = FailureRecord {
                in_flight: record.in_flight,
                ..FailureRecord::fresh(now)
            };
            record.in_flight == 0
        });
    }

    fn release(&self, client: &str) {
        self.clients.remove_if_mut(client, |_, record| {
            record.in_flight = record.in_flight.saturating_sub(1);
            record.in_flight == 0 && record.failures == 0 && record.locked_until.is_none()
        });
    }

    /// Drop records that no longer influence any decision
    pub fn sweep(&self) {
        let now = Instant::now();
        let window = self.config.failure_window;
        self.clients.retain(|_, record| {
            record.in_flight > 0
                || match record.locked_until {
                    Some(until) => until > now,
                    None => now.duration_since(record.window_started) <= window,
                }
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

impl LookupAttempt<'_> {
    /// The code resolved; clears the client's record
    pub fn succeeded(mut self) {
        self.settled = true;
        self.throttle.record_success(&self.client);
    }

    /// The code matched nobody; returns `true` if this started a lockout
    pub fn failed(mut self) -> bool {
        self.settled = true;
        self.throttle.record_failure(&self.client)
    }
}

impl Drop for LookupAttempt<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.throttle.release(&self.client);
        }
    }
}
