//! # Self-service Handlers
//!
//! Credential and passkey management for the signed-in student. Every route
//! here sits behind [`require_student`](crate::middleware::auth::require_student).

use crate::db::credentials;
use crate::db::models::CredentialSummary;
use crate::db::students;
use crate::error::AppResult;
use crate::middleware::auth::CurrentStudent;
use crate::passkey;
use crate::state::AppState;
use crate::webauthn::registration;
use crate::webauthn::types::RegisterFinishRequest;
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

/// POST /api/me/credentials/register/start
pub async fn register_start(
    State(state): State<AppState>,
    Extension(CurrentStudent(student_id)): Extension<CurrentStudent>,
) -> AppResult<Json<Value>> {
    let options = registration::start_registration(&state, &student_id).await?;

    Ok(Json(options))
}

/// POST /api/me/credentials/register/finish
pub async fn register_finish(
    State(state): State<AppState>,
    Extension(CurrentStudent(student_id)): Extension<CurrentStudent>,
    Json(req): Json<RegisterFinishRequest>,
) -> AppResult<Json<Value>> {
    let credential =
        registration::finish_registration(&state, &student_id, &req.credential, &req.device_name).await?;

    Ok(Json(json!({ "credential": credential })))
}

/// GET /api/me/credentials
pub async fn list_credentials(
    State(state): State<AppState>,
    Extension(CurrentStudent(student_id)): Extension<CurrentStudent>,
) -> AppResult<Json<Value>> {
    let credentials: Vec<CredentialSummary> = credentials::find_by_student_id(&state.db, &student_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(json!({ "credentials": credentials })))
}

/// DELETE /api/me/credentials/{id}
pub async fn delete_credential(
    State(state): State<AppState>,
    Extension(CurrentStudent(student_id)): Extension<CurrentStudent>,
    Path(credential_id): Path<String>,
) -> AppResult<Json<Value>> {
    credentials::delete_credential(&state.db, &student_id, &credential_id).await?;
    tracing::info!(student_id, credential_id, "credential removed");

    Ok(Json(json!({ "success": true })))
}

/// GET /api/me/passkey
pub async fn get_passkey(
    State(state): State<AppState>,
    Extension(CurrentStudent(student_id)): Extension<CurrentStudent>,
) -> AppResult<Json<Value>> {
    let student = students::find_by_id(&state.db, &student_id).await?;

    Ok(Json(json!({ "passkey": student.passkey })))
}

/// POST /api/me/passkey/regenerate
pub async fn regenerate_passkey(
    State(state): State<AppState>,
    Extension(CurrentStudent(student_id)): Extension<CurrentStudent>,
) -> AppResult<Json<Value>> {
    let passkey = passkey::regenerate(&state.db, &student_id).await?;

    Ok(Json(json!({ "passkey": passkey })))
}
