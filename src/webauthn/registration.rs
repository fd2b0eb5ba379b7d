//! # Credential Registration
//!
//! Self-service enrolment of a biometric credential for the signed-in student.
//! Registration is a two-step process: start and finish.
//!
//! ## Registration Flow
//! 1. **Start**: generate a challenge, excluding credentials the student already
//!    owns → send to client
//! 2. **Finish**: consume the challenge, verify the attestation → store the
//!    public key under a device name
//!
//! The caller is identified by session, so no passkey lookup takes place here.

use crate::db::models::{ChallengePurpose, CredentialSummary, PendingChallenge};
use crate::db::{challenges, credentials, students};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::webauthn::verifier::{response_challenge, CeremonyError, NewCredential};
use chrono::Utc;
use serde_json::Value;

/// Longest accepted device label, in characters
pub const MAX_DEVICE_NAME_LEN: usize = 64;

/// Start registering a new credential for `student_id`
///
/// Returns the creation options for `navigator.credentials.create()`.
pub async fn start_registration(state: &AppState, student_id: &str) -> AppResult<Value> {
    let student = students::find_by_id(&state.db, student_id).await?;
    let existing = credentials::find_by_student_id(&state.db, &student.id).await?;

    let issued = state.verifier.start_registration(&student, &existing).map_err(|e| {
        tracing::error!(student_id, error = %e, "could not issue registration challenge");
        AppError::Internal("Could not start registration".to_string())
    })?;

    let challenge = PendingChallenge::new(
        student.id.clone(),
        ChallengePurpose::Registration,
        issued.nonce,
        issued.state,
        Utc::now(),
        state.config.challenge_ttl,
    );
    challenges::save_challenge(&state.db, &challenge).await?;

    Ok(issued.options)
}

/// Finish registration and store the credential as `device_name`
///
/// ## Errors
/// - BadRequest: empty or overlong device name, or any ceremony failure
/// - Database: storing the credential failed
pub async fn finish_registration(
    state: &AppState,
    student_id: &str,
    response: &Value,
    device_name: &str,
) -> AppResult<CredentialSummary> {
    let device_name = device_name.trim();
    if device_name.is_empty() || device_name.chars().count() > MAX_DEVICE_NAME_LEN {
        return Err(AppError::BadRequest(format!(
            "Device name must be 1 to {} characters",
            MAX_DEVICE_NAME_LEN
        )));
    }

    let new_credential = verify_attestation(state, student_id, response)
        .await
        .map_err(|e| match e {
            CeremonyError::Store(err @ AppError::Database(_)) => err,
            other => {
                tracing::warn!(student_id, error = %other, "credential registration refused");
                AppError::BadRequest("Registration failed".to_string())
            }
        })?;

    let stored = credentials::save_credential(
        &state.db,
        &new_credential.credential_id,
        student_id,
        &new_credential.credential,
        new_credential.sign_count,
        device_name,
    )
    .await?;

    tracing::info!(student_id, credential_id = %stored.id, "credential registered");

    Ok(stored.into())
}

async fn verify_attestation(
    state: &AppState,
    student_id: &str,
    response: &Value,
) -> Result<NewCredential, CeremonyError> {
    let nonce = response_challenge(response)
        .ok_or_else(|| CeremonyError::Malformed("response carries no challenge".to_string()))?;
    let pending = challenges::take_by_nonce(&state.db, &nonce)
        .await?
        .ok_or(CeremonyError::ChallengeMissing)?;

    if pending.purpose != ChallengePurpose::Registration.as_str() || pending.student_id != student_id {
        return Err(CeremonyError::ChallengeMismatch);
    }
    if pending.is_expired_at(Utc::now())? {
        return Err(CeremonyError::ChallengeExpired);
    }

    state.verifier.finish_registration(&pending.state, response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::connect_in_memory;
    use crate::passkey;
    use crate::webauthn::authentication::{finish_authentication, start_authentication};
    use crate::webauthn::verifier::fake::{self, FakeVerifier};
    use std::sync::Arc;

    async fn setup() -> (AppState, String) {
        let pool = connect_in_memory().await.unwrap();
        let student = passkey::provision_student(&pool, "Ada").await.unwrap();
        let state = AppState::from_parts(pool, Arc::new(FakeVerifier), Config::default());
        (state, student.id)
    }

    #[tokio::test]
    async fn test_register_then_exclude_on_next_start() {
        let (state, student_id) = setup().await;

        let options = start_registration(&state, &student_id).await.unwrap();
        assert_eq!(options["publicKey"]["excludeCredentials"], serde_json::json!([]));

        let response = fake::attestation(&fake::nonce_of(&options), "cred-phone");
        let summary = finish_registration(&state, &student_id, &response, "  Pixel 8 ")
            .await
            .unwrap();
        assert_eq!(summary.id, "cred-phone");
        assert_eq!(summary.device_name, "Pixel 8");
        assert!(summary.last_used_at.is_none());

        let options = start_registration(&state, &student_id).await.unwrap();
        assert_eq!(options["publicKey"]["excludeCredentials"][0], "cred-phone");

        let stored = credentials::find_by_student_id(&state.db, &student_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].sign_count, 0);
    }

    #[tokio::test]
    async fn test_attested_counter_is_the_starting_point() {
        let (state, student_id) = setup().await;
        let student = students::find_by_id(&state.db, &student_id).await.unwrap();

        let options = start_registration(&state, &student_id).await.unwrap();
        let response = fake::attestation_with_count(&fake::nonce_of(&options), "cred-key", 7);
        finish_registration(&state, &student_id, &response, "Security key")
            .await
            .unwrap();

        let stored = credentials::find_by_student_id(&state.db, &student_id).await.unwrap();
        assert_eq!(stored[0].sign_count, 7);

        // The attested value is already spent
        let options = start_authentication(&state, "10.0.0.7", &student.passkey).await.unwrap();
        let assertion = fake::assertion(&fake::nonce_of(&options), "cred-key", 7, "valid");
        let err = finish_authentication(&state, "10.0.0.7", &student.passkey, "Room 101", &assertion)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn test_device_name_is_required() {
        let (state, student_id) = setup().await;
        let options = start_registration(&state, &student_id).await.unwrap();
        let response = fake::attestation(&fake::nonce_of(&options), "cred-phone");

        let err = finish_registration(&state, &student_id, &response, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let long = "x".repeat(MAX_DEVICE_NAME_LEN + 1);
        let err = finish_registration(&state, &student_id, &response, &long)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        // Name checks happen before the challenge is consumed
        assert!(finish_registration(&state, &student_id, &response, "Laptop").await.is_ok());
    }

    #[tokio::test]
    async fn test_registration_challenge_is_single_use_and_owned() {
        let (state, student_id) = setup().await;
        let other = passkey::provision_student(&state.db, "Bob").await.unwrap();

        let options = start_registration(&state, &student_id).await.unwrap();
        let response = fake::attestation(&fake::nonce_of(&options), "cred-phone");

        let err = finish_registration(&state, &other.id, &response, "Phone")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        // The mismatched attempt consumed it
        let err = finish_registration(&state, &student_id, &response, "Phone")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(credentials::find_by_student_id(&state.db, &student_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_authentication_challenge_cannot_register() {
        let (state, student_id) = setup().await;
        credentials::save_credential(&state.db, "cred-old", &student_id, b"{}", 0, "Old")
            .await
            .unwrap();
        let student = students::find_by_id(&state.db, &student_id).await.unwrap();

        let options = crate::webauthn::authentication::start_authentication(&state, "10.0.0.1", &student.passkey)
            .await
            .unwrap();
        let response = fake::attestation(&fake::nonce_of(&options), "cred-new");

        let err = finish_registration(&state, &student_id, &response, "Phone")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
