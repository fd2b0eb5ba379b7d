//! # Health Check Handler
//!
//! Used by load balancers and kiosk watchdogs to see that the server is up.

use axum::Json;
use serde_json::{json, Value};

/// GET /health
///
/// ```json
/// { "status": "healthy", "service": "kiosk-checkin" }
/// ```
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "kiosk-checkin"
    }))
}
