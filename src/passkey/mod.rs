//! # Passkey Store
//!
//! The 6-digit code each student types at the kiosk.
//!
//! ## Responsibilities
//! - Validate the shape of a typed code
//! - Resolve a code to its active student, through the [`PasskeyThrottle`]
//! - Issue codes, retrying on collision until unique among active students
//!
//! A typed code is a weak factor: anyone who learns it can check in as its
//! owner. Resolution is therefore always throttled, whichever path (typed scan
//! or biometric ceremony) asks for it.

pub mod throttle;

pub use throttle::PasskeyThrottle;

use crate::db::models::Student;
use crate::db::students::{self, PasskeyWrite};
use crate::error::{AppError, AppResult};
use rand::Rng;
use sqlx::SqlitePool;

/// Number of digits in a passkey
pub const PASSKEY_LENGTH: usize = 6;

const MAX_ISSUE_ATTEMPTS: usize = 32;

/// Reject anything that is not exactly six ASCII digits
pub fn validate(passkey: &str) -> AppResult<()> {
    if passkey.len() != PASSKEY_LENGTH || !passkey.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::Validation(format!(
            "Passkey must be exactly {} digits",
            PASSKEY_LENGTH
        )));
    }
    Ok(())
}

/// Draw a uniformly random code, leading zeros included
pub fn generate_code() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", value)
}

/// Resolve `passkey` to its active student on behalf of `client`
///
/// Malformed codes fail validation without touching the throttle. Unknown or
/// inactive codes count as a failed lookup for `client`. The attempt is
/// reserved before the store is queried, so concurrent guesses share the limit.
pub async fn resolve(
    pool: &SqlitePool,
    throttle: &PasskeyThrottle,
    client: &str,
    passkey: &str,
) -> AppResult<Student> {
    validate(passkey)?;
    let attempt = throttle.begin(client)?;

    match students::find_active_by_passkey(pool, passkey).await? {
        Some(student) => {
            attempt.succeeded();
            Ok(student)
        }
        None => {
            tracing::debug!(client, "passkey lookup failed");
            attempt.failed();
            Err(AppError::InvalidPasskey)
        }
    }
}

/// Give the student a fresh code and return it
///
/// The old code stops resolving the moment the update commits.
pub async fn regenerate(pool: &SqlitePool, student_id: &str) -> AppResult<String> {
    for _ in 0..MAX_ISSUE_ATTEMPTS {
        let code = generate_code();
        match students::replace_passkey(pool, student_id, &code).await? {
            PasskeyWrite::Written => {
                tracing::info!(student_id, "passkey regenerated");
                return Ok(code);
            }
            PasskeyWrite::Collision => continue,
        }
    }

    Err(AppError::Internal(
        "Could not find a free passkey code".to_string(),
    ))
}

/// Create a student holding a freshly issued code
pub async fn provision_student(pool: &SqlitePool, name: &str) -> AppResult<Student> {
    for _ in 0..MAX_ISSUE_ATTEMPTS {
        let code = generate_code();
        if let Some(student) = students::insert_student(pool, name, &code).await? {
            return Ok(student);
        }
    }

    Err(AppError::Internal(
        "Could not find a free passkey code".to_string(),
    ))
}
