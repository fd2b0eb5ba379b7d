//! # Terminal Controller
//!
//! The kiosk screen as one state machine, run as a tokio actor.
//!
//! ## States
//! | state     | entered by                          | left by                         |
//! |-----------|-------------------------------------|---------------------------------|
//! | `Idle`    | start-up, dismissal, reset timer    | sixth digit, submit, biometric  |
//! | `Loading` | a scan starting                     | the scan's result               |
//! | `Success` | scan result `Ok`                    | dismissal or reset timer        |
//! | `Error`   | scan failure, or a local input miss | dismissal or reset timer        |
//!
//! ## Invariants
//! - Keypad input is only accepted in `Idle`, so at most one scan is in flight.
//! - Every transition aborts the pending reset timer and bumps the generation.
//!   Worker results and timer fires carry the generation they were started
//!   under and are dropped when it is no longer current.
//! - Every scan is bounded by a timeout and a panicking worker is reported as
//!   an error, so the screen always finds its way back to `Idle`.

use crate::attendance::ScanOutcome;
use crate::kiosk::api::KioskApi;
use crate::kiosk::authenticator::PlatformAuthenticator;
use crate::kiosk::config::KioskConfig;
use crate::kiosk::error::KioskError;
use crate::passkey::PASSKEY_LENGTH;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Keypad and touch input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KioskEvent {
    Digit(char),
    Backspace,
    Clear,
    /// Scan with the typed code (needed when auto-submit is off)
    Submit,
    /// Scan with the typed code plus the biometric prompt
    Biometric,
    /// Close the result screen early
    Dismiss,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KioskState {
    Idle,
    Loading,
    Success(ScanOutcome),
    Error(String),
}

/// What the screen renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KioskView {
    pub state: KioskState,
    /// Digits typed so far
    pub buffer: String,
}

impl Default for KioskView {
    fn default() -> Self {
        Self {
            state: KioskState::Idle,
            buffer: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ScanPath {
    Passkey,
    Biometric,
}

enum Internal {
    Completed {
        generation: u64,
        result: Result<ScanOutcome, KioskError>,
    },
    ResetFired {
        generation: u64,
    },
}

/// Owner's side of a running controller
pub struct KioskHandle {
    events: mpsc::Sender<KioskEvent>,
    view: watch::Receiver<KioskView>,
    task: JoinHandle<()>,
}

impl KioskHandle {
    pub async fn send(&self, event: KioskEvent) -> Result<(), KioskError> {
        self.events
            .send(event)
            .await
            .map_err(|_| KioskError::Internal("controller stopped".to_string()))
    }

    /// Subscribe to screen updates
    pub fn view(&self) -> watch::Receiver<KioskView> {
        self.view.clone()
    }

    pub fn current(&self) -> KioskView {
        self.view.borrow().clone()
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

/// Start a controller task
pub fn spawn(
    config: KioskConfig,
    api: Arc<dyn KioskApi>,
    authenticator: Arc<dyn PlatformAuthenticator>,
) -> KioskHandle {
    let (events_tx, events_rx) = mpsc::channel(32);
    let (internal_tx, internal_rx) = mpsc::unbounded_channel();
    let (view_tx, view_rx) = watch::channel(KioskView::default());

    let controller = Controller {
        config,
        api,
        authenticator,
        buffer: String::new(),
        state: KioskState::Idle,
        generation: 0,
        reset_timer: None,
        internal_tx,
        view_tx,
    };
    let task = tokio::spawn(controller.run(events_rx, internal_rx));

    KioskHandle {
        events: events_tx,
        view: view_rx,
        task,
    }
}

struct Controller {
    config: KioskConfig,
    api: Arc<dyn KioskApi>,
    authenticator: Arc<dyn PlatformAuthenticator>,
    buffer: String,
    state: KioskState,
    generation: u64,
    reset_timer: Option<JoinHandle<()>>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    view_tx: watch::Sender<KioskView>,
}

impl Controller {
    async fn run(
        mut self,
        mut events: mpsc::Receiver<KioskEvent>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.on_event(event),
                    None => break,
                },
                Some(message) = internal.recv() => self.on_internal(message),
            }
        }

        self.cancel_reset();
        tracing::debug!("kiosk controller stopped");
    }

    fn on_event(&mut self, event: KioskEvent) {
        match (&self.state, event) {
            (KioskState::Idle, KioskEvent::Digit(digit)) => {
                if !digit.is_ascii_digit() || self.buffer.len() >= PASSKEY_LENGTH {
                    return;
                }
                self.buffer.push(digit);
                self.publish();
                if self.config.auto_submit && self.buffer.len() == PASSKEY_LENGTH {
                    self.begin_scan(ScanPath::Passkey);
                }
            }
            (KioskState::Idle, KioskEvent::Backspace) => {
                self.buffer.pop();
                self.publish();
            }
            (KioskState::Idle, KioskEvent::Clear) => {
                self.buffer.clear();
                self.publish();
            }
            (KioskState::Idle, KioskEvent::Submit) => self.try_scan(ScanPath::Passkey),
            (KioskState::Idle, KioskEvent::Biometric) => self.try_scan(ScanPath::Biometric),
            (KioskState::Success(_) | KioskState::Error(_), KioskEvent::Dismiss) => self.reset_to_idle(),
            (state, event) => {
                tracing::trace!(?state, ?event, "input ignored");
            }
        }
    }

    fn on_internal(&mut self, message: Internal) {
        match message {
            Internal::Completed { generation, result } => {
                if generation != self.generation {
                    tracing::debug!(generation, current = self.generation, "stale scan result dropped");
                    return;
                }
                match result {
                    Ok(outcome) => {
                        tracing::info!(student = %outcome.student.name, action = ?outcome.action, "scan completed");
                        self.transition(KioskState::Success(outcome));
                        self.schedule_reset(self.config.success_reset);
                    }
                    Err(e) => {
                        tracing::warn!(error = ?e, "scan failed");
                        self.transition(KioskState::Error(e.to_string()));
                        self.schedule_reset(self.config.error_reset);
                    }
                }
            }
            Internal::ResetFired { generation } => {
                if generation == self.generation {
                    self.reset_to_idle();
                }
            }
        }
    }

    fn try_scan(&mut self, path: ScanPath) {
        if self.buffer.len() == PASSKEY_LENGTH {
            self.begin_scan(path);
            return;
        }

        let message = match path {
            ScanPath::Passkey => format!("Enter all {} digits of your passkey", PASSKEY_LENGTH),
            ScanPath::Biometric => format!("Enter your {}-digit passkey first", PASSKEY_LENGTH),
        };
        self.transition(KioskState::Error(message));
        self.schedule_reset(self.config.validation_reset);
    }

    fn begin_scan(&mut self, path: ScanPath) {
        let generation = self.transition(KioskState::Loading);

        let passkey = self.buffer.clone();
        let api = Arc::clone(&self.api);
        let authenticator = Arc::clone(&self.authenticator);
        let request_timeout = self.config.request_timeout;
        let ceremony_timeout = self.config.ceremony_timeout;
        let reply = self.internal_tx.clone();

        tokio::spawn(async move {
            let worker = tokio::spawn(async move {
                match path {
                    ScanPath::Passkey => bounded(request_timeout, api.scan_by_passkey(&passkey)).await,
                    ScanPath::Biometric => {
                        biometric_check_in(api, authenticator, passkey, request_timeout, ceremony_timeout).await
                    }
                }
            });

            let result = match worker.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(error = %e, "scan worker died");
                    Err(KioskError::Internal(e.to_string()))
                }
            };
            let _ = reply.send(Internal::Completed { generation, result });
        });
    }

    /// Replace the state; returns the new generation
    fn transition(&mut self, state: KioskState) -> u64 {
        self.cancel_reset();
        self.generation += 1;
        self.state = state;
        self.publish();
        self.generation
    }

    fn schedule_reset(&mut self, delay: Duration) {
        let generation = self.generation;
        let reply = self.internal_tx.clone();
        self.reset_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = reply.send(Internal::ResetFired { generation });
        }));
    }

    fn cancel_reset(&mut self) {
        if let Some(timer) = self.reset_timer.take() {
            timer.abort();
        }
    }

    fn reset_to_idle(&mut self) {
        self.buffer.clear();
        self.transition(KioskState::Idle);
    }

    fn publish(&self) {
        self.view_tx.send_replace(KioskView {
            state: self.state.clone(),
            buffer: self.buffer.clone(),
        });
    }
}

async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, KioskError>>,
) -> Result<T, KioskError> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| KioskError::Timeout)?
}

async fn biometric_check_in(
    api: Arc<dyn KioskApi>,
    authenticator: Arc<dyn PlatformAuthenticator>,
    passkey: String,
    request_timeout: Duration,
    ceremony_timeout: Duration,
) -> Result<ScanOutcome, KioskError> {
    let options = bounded(request_timeout, api.authenticate_start(&passkey)).await?;
    let assertion = bounded(ceremony_timeout, authenticator.get_assertion(options)).await?;
    bounded(request_timeout, api.authenticate_finish(&passkey, assertion)).await
}
