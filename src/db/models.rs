//! # Database Models
//!
//! Structs that map to database tables. Rows are read with `sqlx::FromRow`.
//!
//! ## Timestamps
//! All timestamps are stored as RFC3339 text in UTC with millisecond precision
//! and a `Z` suffix (see [`timestamp`]). The fixed width keeps them
//! lexicographically ordered, so SQL comparisons on them are valid.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Format a point in time the way every table stores it
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp back into a `DateTime<Utc>`
pub fn parse_timestamp(raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AppError::Internal(format!("Invalid stored timestamp '{}'", raw)))
}

/// A student as provisioned by the admin system
///
/// `passkey` is the student's current 6-digit kiosk code. It is never part of a
/// kiosk response.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub passkey: String,
    pub is_active: bool,
    pub created_at: String,
}

/// A registered public-key credential
///
/// ## What is stored?
/// - `credential`: the serialized ceremony-library credential record, which
///   contains the public key. Private keys never leave the student's device.
/// - `sign_count`: the authenticator counter from the last verified use. It only
///   ever moves forward; a presented counter that does not exceed it marks the
///   assertion as coming from a cloned authenticator.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StudentCredential {
    /// Base64url (no padding) credential ID
    pub id: String,
    pub student_id: String,
    pub credential: Vec<u8>,
    pub sign_count: i64,
    /// Label the student chose at registration ("Pixel 8", "Work laptop")
    pub device_name: String,
    pub created_at: String,
    pub last_used_at: Option<String>,
}

/// What the self-service API reveals about a credential
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSummary {
    pub id: String,
    pub device_name: String,
    pub created_at: String,
    pub last_used_at: Option<String>,
}

impl From<StudentCredential> for CredentialSummary {
    fn from(credential: StudentCredential) -> Self {
        Self {
            id: credential.id,
            device_name: credential.device_name,
            created_at: credential.created_at,
            last_used_at: credential.last_used_at,
        }
    }
}

/// Which ceremony a pending challenge belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengePurpose {
    Authentication,
    Registration,
}

impl ChallengePurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            ChallengePurpose::Authentication => "authentication",
            ChallengePurpose::Registration => "registration",
        }
    }
}

/// A challenge issued by a ceremony start and awaiting its finish
///
/// ## Challenge Lifecycle
/// 1. Ceremony start stores the challenge, bound to one student
/// 2. The authenticator signs it on the student's device
/// 3. Ceremony finish deletes it (whatever the verification outcome) and only
///    then verifies the response against it
/// 4. Challenges nobody finishes are purged once `expires_at` passes
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingChallenge {
    pub id: String,
    pub student_id: String,
    pub purpose: String,
    /// The challenge bytes, base64url without padding
    pub nonce: String,
    /// Serialized ceremony-library state needed to verify the response
    pub state: Vec<u8>,
    pub created_at: String,
    pub expires_at: String,
}

impl PendingChallenge {
    pub fn new(
        student_id: String,
        purpose: ChallengePurpose,
        nonce: String,
        state: Vec<u8>,
        now: DateTime<Utc>,
        ttl: std::time::Duration,
    ) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::minutes(5));

        Self {
            id: Uuid::new_v4().to_string(),
            student_id,
            purpose: purpose.as_str().to_string(),
            nonce,
            state,
            created_at: timestamp(now),
            expires_at: timestamp(now + ttl),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> AppResult<bool> {
        Ok(now > parse_timestamp(&self.expires_at)?)
    }
}

/// A class occurrence at a location
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Schedule {
    pub id: String,
    pub location: String,
    pub title: String,
    pub starts_at: String,
    pub ends_at: String,
}

/// Lifecycle of an attendance session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Entered, not yet left
    Present,
    /// Entered and left
    Completed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Present => "PRESENT",
            SessionStatus::Completed => "COMPLETED",
        }
    }
}

/// One student's attendance for one schedule
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttendanceSession {
    pub id: String,
    pub student_id: String,
    pub schedule_id: String,
    pub entry_timestamp: String,
    pub exit_timestamp: Option<String>,
    pub status: String,
}
