//! # Check-in Server Client
//!
//! [`KioskApi`] is everything the terminal asks of the server. [`HttpKioskApi`]
//! speaks the server's JSON API; failures come back as [`KioskError`], with
//! `{"error": message}` bodies turned into [`KioskError::Server`].

use crate::attendance::{CurrentSchedule, ScanOutcome, ScanRequest, ScheduleSummary};
use crate::kiosk::config::KioskConfig;
use crate::kiosk::error::KioskError;
use crate::webauthn::types::{AuthenticateFinishRequest, AuthenticateStartRequest};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

#[async_trait]
pub trait KioskApi: Send + Sync {
    /// Weak path: check in with the typed code alone
    async fn scan_by_passkey(&self, passkey: &str) -> Result<ScanOutcome, KioskError>;

    /// Strong path, step 1: options for the biometric prompt
    async fn authenticate_start(&self, passkey: &str) -> Result<Value, KioskError>;

    /// Strong path, step 2
    async fn authenticate_finish(&self, passkey: &str, assertion: Value) -> Result<ScanOutcome, KioskError>;

    /// Class running at this terminal's location, or the next one
    async fn current_schedule(&self) -> Result<Option<ScheduleSummary>, KioskError>;
}

/// [`KioskApi`] over HTTP
///
/// Every request is bounded by the configured request timeout.
#[derive(Debug, Clone)]
pub struct HttpKioskApi {
    client: reqwest::Client,
    base_url: String,
    location: String,
}

impl HttpKioskApi {
    pub fn new(config: &KioskConfig) -> Result<Self, KioskError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| KioskError::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            location: config.location.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, KioskError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        decode(response).await
    }
}

/// Turn a response into `T`, or into the error its body describes
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, KioskError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let message = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());

    tracing::debug!(status = status.as_u16(), %message, "server refused request");

    Err(KioskError::Server {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl KioskApi for HttpKioskApi {
    async fn scan_by_passkey(&self, passkey: &str) -> Result<ScanOutcome, KioskError> {
        let body = ScanRequest {
            passkey: passkey.to_string(),
            location: self.location.clone(),
        };
        self.post("/api/kiosk/scan", &body).await
    }

    async fn authenticate_start(&self, passkey: &str) -> Result<Value, KioskError> {
        let body = AuthenticateStartRequest {
            passkey: passkey.to_string(),
        };
        self.post("/api/kiosk/authenticate/start", &body).await
    }

    async fn authenticate_finish(&self, passkey: &str, assertion: Value) -> Result<ScanOutcome, KioskError> {
        let body = AuthenticateFinishRequest {
            passkey: passkey.to_string(),
            location: self.location.clone(),
            assertion,
        };
        self.post("/api/kiosk/authenticate/finish", &body).await
    }

    async fn current_schedule(&self) -> Result<Option<ScheduleSummary>, KioskError> {
        let response = self
            .client
            .get(self.url("/api/kiosk/schedule"))
            .query(&[("location", self.location.as_str())])
            .send()
            .await?;
        let banner: CurrentSchedule = decode(response).await?;
        Ok(banner.schedule)
    }
}

/// Scriptable server stand-in for terminal tests
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use crate::attendance::{AttendanceAction, StudentSummary};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    pub fn outcome(action: AttendanceAction) -> ScanOutcome {
        ScanOutcome {
            student: StudentSummary {
                id: "student-1".into(),
                name: "Ada".into(),
            },
            action,
            schedule: schedule(),
            timestamp: "2024-09-02T09:01:00.000Z".into(),
        }
    }

    pub fn schedule() -> ScheduleSummary {
        ScheduleSummary {
            id: "schedule-1".into(),
            title: "Algebra".into(),
            location: "Room 101".into(),
            starts_at: "2024-09-02T09:00:00.000Z".into(),
            ends_at: "2024-09-02T10:00:00.000Z".into(),
        }
    }

    /// What the fake server does on each call
    #[derive(Clone)]
    pub enum Reply {
        Ok(ScanOutcome),
        Fail(KioskError),
        Panic,
    }

    pub struct FakeApi {
        pub reply: Mutex<Reply>,
        pub delay: Duration,
        pub calls: AtomicUsize,
        pub passkeys: Mutex<Vec<String>>,
        pub assertions: Mutex<Vec<Value>>,
        pub banner: Mutex<Result<Option<ScheduleSummary>, KioskError>>,
    }

    impl FakeApi {
        pub fn new(reply: Reply, delay: Duration) -> Self {
            Self {
                reply: Mutex::new(reply),
                delay,
                calls: AtomicUsize::new(0),
                passkeys: Mutex::new(Vec::new()),
                assertions: Mutex::new(Vec::new()),
                banner: Mutex::new(Ok(None)),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn answer(&self, passkey: &str) -> Result<ScanOutcome, KioskError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.passkeys.lock().unwrap().push(passkey.to_string());
            tokio::time::sleep(self.delay).await;

            let reply = self.reply.lock().unwrap().clone();
            match reply {
                Reply::Ok(outcome) => Ok(outcome),
                Reply::Fail(e) => Err(e),
                Reply::Panic => panic!("fake server exploded"),
            }
        }
    }

    #[async_trait]
    impl KioskApi for FakeApi {
        async fn scan_by_passkey(&self, passkey: &str) -> Result<ScanOutcome, KioskError> {
            self.answer(passkey).await
        }

        async fn authenticate_start(&self, passkey: &str) -> Result<Value, KioskError> {
            self.passkeys.lock().unwrap().push(passkey.to_string());
            Ok(serde_json::json!({ "publicKey": { "challenge": "abc" } }))
        }

        async fn authenticate_finish(&self, passkey: &str, assertion: Value) -> Result<ScanOutcome, KioskError> {
            self.assertions.lock().unwrap().push(assertion);
            self.answer(passkey).await
        }

        async fn current_schedule(&self) -> Result<Option<ScheduleSummary>, KioskError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.banner.lock().unwrap().clone()
        }
    }
}
