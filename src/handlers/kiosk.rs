//! # Kiosk Handlers
//!
//! Public endpoints used by the shared check-in terminal. No session is
//! involved: every request identifies the student by the typed passkey, and
//! every passkey lookup goes through the per-terminal throttle.

use crate::attendance::{self, AuthenticatedStudent, CurrentSchedule, ScanOutcome, ScanRequest, ScheduleQuery};
use crate::error::{AppError, AppResult};
use crate::middleware::client::ClientAddr;
use crate::passkey;
use crate::state::AppState;
use crate::webauthn::authentication;
use crate::webauthn::types::{AuthenticateFinishRequest, AuthenticateStartRequest};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde_json::Value;

fn require_location(location: &str) -> AppResult<&str> {
    let location = location.trim();
    if location.is_empty() {
        return Err(AppError::Validation("Location is required".to_string()));
    }
    Ok(location)
}

/// Weak path: check in with the typed code alone
///
/// ## Route
/// POST /api/kiosk/scan
pub async fn scan(
    State(state): State<AppState>,
    Extension(ClientAddr(client)): Extension<ClientAddr>,
    Json(req): Json<ScanRequest>,
) -> AppResult<Json<ScanOutcome>> {
    let location = require_location(&req.location)?;
    let student: AuthenticatedStudent = passkey::resolve(&state.db, &state.throttle, &client, &req.passkey)
        .await?
        .into();

    let outcome =
        attendance::record_scan(&state.db, state.schedules.as_ref(), &student, location, Utc::now()).await?;

    Ok(Json(outcome))
}

/// Strong path, step 1
///
/// ## Route
/// POST /api/kiosk/authenticate/start
///
/// ## Response
/// Options for `navigator.credentials.get()`
pub async fn authenticate_start(
    State(state): State<AppState>,
    Extension(ClientAddr(client)): Extension<ClientAddr>,
    Json(req): Json<AuthenticateStartRequest>,
) -> AppResult<Json<Value>> {
    let options = authentication::start_authentication(&state, &client, &req.passkey).await?;

    Ok(Json(options))
}

/// Strong path, step 2
///
/// ## Route
/// POST /api/kiosk/authenticate/finish
pub async fn authenticate_finish(
    State(state): State<AppState>,
    Extension(ClientAddr(client)): Extension<ClientAddr>,
    Json(req): Json<AuthenticateFinishRequest>,
) -> AppResult<Json<ScanOutcome>> {
    let location = require_location(&req.location)?;
    let outcome =
        authentication::finish_authentication(&state, &client, &req.passkey, location, &req.assertion).await?;

    Ok(Json(outcome))
}

/// Banner: the class running at `location`, or the next one
///
/// ## Route
/// GET /api/kiosk/schedule?location=Room%20101
pub async fn current_schedule(
    State(state): State<AppState>,
    Query(query): Query<ScheduleQuery>,
) -> AppResult<Json<CurrentSchedule>> {
    let location = require_location(&query.location)?;
    let schedule = state.schedules.current_or_next(location, Utc::now()).await?;

    Ok(Json(CurrentSchedule {
        schedule: schedule.map(Into::into),
    }))
}
