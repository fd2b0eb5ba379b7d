//! # Ceremony Verifier
//!
//! The boundary between the ceremony coordinator and the public-key ceremony
//! library. The coordinator owns everything stateful (pending challenges, sign
//! counters, student binding); the verifier only produces options and checks
//! signatures.
//!
//! [`WebauthnVerifier`] is the production implementation on top of
//! `webauthn-rs`. Credential records are stored as the serialized
//! `webauthn_rs::prelude::Passkey`, and ceremony state as the serialized
//! `PasskeyAuthentication` / `PasskeyRegistration`.

use crate::config::Config;
use crate::db::models::{Student, StudentCredential};
use crate::error::{AppError, AppResult};
use base64::prelude::*;
use serde_json::Value;
use thiserror::Error;
use webauthn_rs::prelude::*;

/// Why a ceremony was refused
///
/// These reasons are for server logs only. Kiosk responses collapse all of
/// them into one generic error.
#[derive(Debug, Error)]
pub enum CeremonyError {
    #[error("no pending challenge matches the response")]
    ChallengeMissing,

    #[error("challenge expired")]
    ChallengeExpired,

    #[error("challenge was issued to another student or ceremony")]
    ChallengeMismatch,

    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("sign count {presented} does not exceed stored {stored}")]
    CloneDetected { stored: i64, presented: u32 },

    #[error("credential is not registered to this student")]
    UnknownCredential,

    #[error("student has no registered credentials")]
    NoCredentials,

    #[error("malformed ceremony data: {0}")]
    Malformed(String),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<serde_json::Error> for CeremonyError {
    fn from(e: serde_json::Error) -> Self {
        CeremonyError::Malformed(e.to_string())
    }
}

/// Options for the client plus what the server keeps until finish
#[derive(Debug, Clone)]
pub struct IssuedChallenge {
    /// Sent to the browser as-is (`navigator.credentials.get/create` input)
    pub options: Value,
    /// The challenge, base64url without padding
    pub nonce: String,
    /// Opaque verifier state stored with the pending challenge
    pub state: Vec<u8>,
}

/// A signature that checked out
#[derive(Debug, Clone)]
pub struct VerifiedAssertion {
    pub credential_id: String,
    pub sign_count: u32,
    /// Updated credential record, when the library changed it
    pub refreshed: Option<Vec<u8>>,
}

/// A credential produced by a registration ceremony
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub credential_id: String,
    pub credential: Vec<u8>,
    pub sign_count: u32,
}

pub trait CeremonyVerifier: Send + Sync {
    fn start_authentication(
        &self,
        credentials: &[StudentCredential],
    ) -> Result<IssuedChallenge, CeremonyError>;

    fn finish_authentication(
        &self,
        state: &[u8],
        credentials: &[StudentCredential],
        assertion: &Value,
    ) -> Result<VerifiedAssertion, CeremonyError>;

    fn start_registration(
        &self,
        student: &Student,
        existing: &[StudentCredential],
    ) -> Result<IssuedChallenge, CeremonyError>;

    fn finish_registration(
        &self,
        state: &[u8],
        response: &Value,
    ) -> Result<NewCredential, CeremonyError>;
}

/// Bring a base64 string to unpadded base64url so encodings compare equal
fn normalize_b64(raw: &str) -> String {
    raw.trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect()
}

/// The challenge a browser response was produced for
///
/// Read from `response.clientDataJSON`, which the authenticator signs over, so a
/// tampered value fails signature verification later.
pub fn response_challenge(response: &Value) -> Option<String> {
    let encoded = response.get("response")?.get("clientDataJSON")?.as_str()?;
    let bytes = BASE64_URL_SAFE_NO_PAD.decode(normalize_b64(encoded)).ok()?;
    let client_data: Value = serde_json::from_slice(&bytes).ok()?;
    client_data
        .get("challenge")?
        .as_str()
        .map(normalize_b64)
}

/// The challenge inside serialized creation/request options
fn options_challenge(options: &Value) -> Result<String, CeremonyError> {
    options
        .get("publicKey")
        .and_then(|pk| pk.get("challenge"))
        .and_then(Value::as_str)
        .map(normalize_b64)
        .ok_or_else(|| CeremonyError::Malformed("options without a challenge".to_string()))
}

pub fn encode_credential_id(id: &CredentialID) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(id)
}

fn decode_passkeys(credentials: &[StudentCredential]) -> Result<Vec<Passkey>, CeremonyError> {
    credentials
        .iter()
        .map(|c| serde_json::from_slice::<Passkey>(&c.credential).map_err(CeremonyError::from))
        .collect()
}

/// `webauthn-rs` backed verifier
pub struct WebauthnVerifier {
    webauthn: Webauthn,
}

impl WebauthnVerifier {
    /// Build the relying party from configuration
    ///
    /// Fails when the origin is not a URL or the RP ID is not a suffix of the
    /// origin's host.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let rp_origin = Url::parse(&config.rp_origin)
            .map_err(|e| AppError::Internal(format!("Invalid RP_ORIGIN '{}': {}", config.rp_origin, e)))?;

        let webauthn = WebauthnBuilder::new(&config.rp_id, &rp_origin)?
            .rp_name(&config.rp_name)
            .build()?;

        Ok(Self { webauthn })
    }
}

impl CeremonyVerifier for WebauthnVerifier {
    fn start_authentication(
        &self,
        credentials: &[StudentCredential],
    ) -> Result<IssuedChallenge, CeremonyError> {
        if credentials.is_empty() {
            return Err(CeremonyError::NoCredentials);
        }
        let passkeys = decode_passkeys(credentials)?;

        let (rcr, auth_state) = self
            .webauthn
            .start_passkey_authentication(&passkeys)
            .map_err(|e| CeremonyError::Malformed(format!("{:?}", e)))?;

        let options = serde_json::to_value(&rcr)?;
        let nonce = options_challenge(&options)?;

        Ok(IssuedChallenge {
            options,
            nonce,
            state: serde_json::to_vec(&auth_state)?,
        })
    }

    fn finish_authentication(
        &self,
        state: &[u8],
        credentials: &[StudentCredential],
        assertion: &Value,
    ) -> Result<VerifiedAssertion, CeremonyError> {
        let auth_state: PasskeyAuthentication = serde_json::from_slice(state)?;
        let credential: PublicKeyCredential = serde_json::from_value(assertion.clone())?;

        let result = self
            .webauthn
            .finish_passkey_authentication(&credential, &auth_state)
            .map_err(|e| CeremonyError::SignatureInvalid(format!("{:?}", e)))?;

        let credential_id = encode_credential_id(result.cred_id());

        let stored = credentials
            .iter()
            .find(|c| c.id == credential_id)
            .ok_or(CeremonyError::UnknownCredential)?;
        let mut passkey: Passkey = serde_json::from_slice(&stored.credential)?;
        let refreshed = match passkey.update_credential(&result) {
            Some(true) => Some(serde_json::to_vec(&passkey)?),
            _ => None,
        };

        Ok(VerifiedAssertion {
            credential_id,
            sign_count: result.counter(),
            refreshed,
        })
    }

    fn start_registration(
        &self,
        student: &Student,
        existing: &[StudentCredential],
    ) -> Result<IssuedChallenge, CeremonyError> {
        let user_uuid = Uuid::parse_str(&student.id)
            .map_err(|_| CeremonyError::Malformed("student id is not a UUID".to_string()))?;

        let exclude: Vec<CredentialID> = decode_passkeys(existing)?
            .iter()
            .map(|pk| pk.cred_id().clone())
            .collect();
        let exclude = if exclude.is_empty() { None } else { Some(exclude) };

        let (ccr, reg_state) = self
            .webauthn
            .start_passkey_registration(user_uuid, &student.name, &student.name, exclude)
            .map_err(|e| CeremonyError::Malformed(format!("{:?}", e)))?;

        let options = serde_json::to_value(&ccr)?;
        let nonce = options_challenge(&options)?;

        Ok(IssuedChallenge {
            options,
            nonce,
            state: serde_json::to_vec(&reg_state)?,
        })
    }

    fn finish_registration(
        &self,
        state: &[u8],
        response: &Value,
    ) -> Result<NewCredential, CeremonyError> {
        let reg_state: PasskeyRegistration = serde_json::from_slice(state)?;
        let reg_credential: RegisterPublicKeyCredential = serde_json::from_value(response.clone())?;

        let passkey = self
            .webauthn
            .finish_passkey_registration(&reg_credential, &reg_state)
            .map_err(|e| CeremonyError::SignatureInvalid(format!("{:?}", e)))?;

        let stored = serde_json::to_value(&passkey)?;

        Ok(NewCredential {
            credential_id: encode_credential_id(passkey.cred_id()),
            sign_count: attested_counter(&stored),
            credential: serde_json::to_vec(&stored)?,
        })
    }
}

/// Signature counter the authenticator reported when the credential was created
fn attested_counter(passkey: &Value) -> u32 {
    passkey["cred"]["counter"]
        .as_u64()
        .and_then(|counter| u32::try_from(counter).ok())
        .unwrap_or(0)
}
