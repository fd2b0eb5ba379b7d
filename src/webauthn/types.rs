//! # Ceremony API Types
//!
//! Request bodies for the biometric endpoints. Browser-produced ceremony data
//! (`assertion`, `credential`) is accepted as raw JSON and handed to the
//! verifier, which owns its parsing.

use serde::{Deserialize, Serialize};

/// Kiosk: begin a biometric check-in
///
/// ## Example JSON
/// ```json
/// { "passkey": "482913" }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthenticateStartRequest {
    pub passkey: String,
}

/// Kiosk: complete a biometric check-in
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthenticateFinishRequest {
    /// Re-sent so the server can re-resolve the student
    pub passkey: String,
    pub location: String,
    /// Output of `navigator.credentials.get()`
    pub assertion: serde_json::Value,
}

/// Self-service: complete credential registration
///
/// ## Example JSON
/// ```json
/// { "credential": { "id": "…", "response": { … } }, "deviceName": "Pixel 8" }
/// ```
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFinishRequest {
    /// Output of `navigator.credentials.create()`
    pub credential: serde_json::Value,
    pub device_name: String,
}
