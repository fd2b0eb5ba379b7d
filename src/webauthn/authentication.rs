//! # Kiosk Biometric Check-in
//!
//! The strong path: the student types their passkey, then proves possession of
//! a registered authenticator.
//!
//! ## Flow
//! 1. **Start**: passkey → student → their credentials → fresh challenge,
//!    stored as a pending challenge bound to the student
//! 2. **Finish**: the pending challenge named by the response is deleted first,
//!    then checked (student, purpose, expiry), then the signature is verified
//!    and the sign counter advanced with a compare-and-set
//! 3. The verified student goes to the attendance toggle engine
//!
//! ## Disclosure
//! Every failure in finish leaves the module as
//! [`AppError::AuthenticationFailed`]; the specific reason is only logged.

use crate::attendance::{self, AuthenticatedStudent, ScanOutcome};
use crate::db::models::{ChallengePurpose, PendingChallenge};
use crate::db::{challenges, credentials};
use crate::error::{AppError, AppResult};
use crate::passkey;
use crate::state::AppState;
use crate::webauthn::verifier::{response_challenge, CeremonyError};
use chrono::Utc;
use serde_json::Value;

/// Step 1: issue authentication options for the student behind `passkey`
pub async fn start_authentication(state: &AppState, client: &str, passkey: &str) -> AppResult<Value> {
    let student = passkey::resolve(&state.db, &state.throttle, client, passkey).await?;

    let stored_creds = credentials::find_by_student_id(&state.db, &student.id).await?;
    if stored_creds.is_empty() {
        return Err(AppError::NotFound(
            "No biometric credential registered for this passkey".to_string(),
        ));
    }

    let issued = state.verifier.start_authentication(&stored_creds).map_err(|e| {
        tracing::error!(student_id = %student.id, error = %e, "could not issue authentication challenge");
        AppError::Internal("Could not start biometric check-in".to_string())
    })?;

    let challenge = PendingChallenge::new(
        student.id.clone(),
        ChallengePurpose::Authentication,
        issued.nonce,
        issued.state,
        Utc::now(),
        state.config.challenge_ttl,
    );
    challenges::save_challenge(&state.db, &challenge).await?;

    tracing::debug!(student_id = %student.id, challenge_id = %challenge.id, "authentication challenge issued");

    Ok(issued.options)
}

/// Step 2: verify the assertion and record attendance
pub async fn finish_authentication(
    state: &AppState,
    client: &str,
    passkey: &str,
    location: &str,
    assertion: &Value,
) -> AppResult<ScanOutcome> {
    passkey::validate(passkey)?;

    let student = verify_assertion(state, client, passkey, assertion)
        .await
        .map_err(|e| match e {
            CeremonyError::Store(err @ (AppError::RateLimited { .. } | AppError::Database(_))) => err,
            other => {
                tracing::warn!(client, error = %other, "biometric check-in refused");
                AppError::AuthenticationFailed
            }
        })?;

    attendance::record_scan(&state.db, state.schedules.as_ref(), &student, location, Utc::now()).await
}

async fn verify_assertion(
    state: &AppState,
    client: &str,
    passkey: &str,
    assertion: &Value,
) -> Result<AuthenticatedStudent, CeremonyError> {
    // Consume before anything can fail, so a rejected response burns its challenge too.
    let nonce = response_challenge(assertion)
        .ok_or_else(|| CeremonyError::Malformed("response carries no challenge".to_string()))?;
    let pending = challenges::take_by_nonce(&state.db, &nonce).await?;

    let student = passkey::resolve(&state.db, &state.throttle, client, passkey).await?;

    let pending = pending.ok_or(CeremonyError::ChallengeMissing)?;
    if pending.purpose != ChallengePurpose::Authentication.as_str() || pending.student_id != student.id {
        return Err(CeremonyError::ChallengeMismatch);
    }
    if pending.is_expired_at(Utc::now())? {
        return Err(CeremonyError::ChallengeExpired);
    }

    let stored_creds = credentials::find_by_student_id(&state.db, &student.id).await?;
    let verified = state
        .verifier
        .finish_authentication(&pending.state, &stored_creds, assertion)?;

    let stored = stored_creds
        .iter()
        .find(|c| c.id == verified.credential_id)
        .ok_or(CeremonyError::UnknownCredential)?;
    if i64::from(verified.sign_count) <= stored.sign_count {
        return Err(CeremonyError::CloneDetected {
            stored: stored.sign_count,
            presented: verified.sign_count,
        });
    }

    // A concurrent finish with the same counter loses here.
    let advanced = credentials::advance_sign_count(
        &state.db,
        &stored.id,
        verified.sign_count,
        verified.refreshed.as_deref(),
    )
    .await?;
    if !advanced {
        return Err(CeremonyError::CloneDetected {
            stored: stored.sign_count,
            presented: verified.sign_count,
        });
    }

    tracing::debug!(student_id = %student.id, credential_id = %stored.id, "assertion verified");

    Ok(student.into())
}
