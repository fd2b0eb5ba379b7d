//! # Session Handlers
//!
//! The student session is created by the external sign-in system; these
//! endpoints only report on it and end it.

use crate::error::{AppError, AppResult};
use crate::middleware::auth::STUDENT_ID_KEY;
use axum::Json;
use serde_json::{json, Value};
use tower_sessions::Session;

/// Check whether a student session exists
///
/// ## Route
/// GET /api/auth/session
///
/// ## Response
/// ```json
/// { "authenticated": true, "student_id": "5f0c…" }
/// ```
pub async fn session_info(session: Session) -> AppResult<Json<Value>> {
    let student_id: Option<String> = session
        .get(STUDENT_ID_KEY)
        .await
        .map_err(|e| AppError::Internal(format!("Session error: {}", e)))?;

    match student_id {
        Some(id) => Ok(Json(json!({
            "authenticated": true,
            "student_id": id
        }))),
        None => Ok(Json(json!({
            "authenticated": false
        }))),
    }
}

/// End the session
///
/// ## Route
/// POST /api/auth/logout
pub async fn logout(session: Session) -> AppResult<Json<Value>> {
    session
        .delete()
        .await
        .map_err(|e| AppError::Internal(format!("Session error: {}", e)))?;

    Ok(Json(json!({
        "success": true,
        "message": "Logged out successfully"
    })))
}
