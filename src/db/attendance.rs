//! Attendance session rows.
//!
//! Each transition is a single conditional statement guarded by the unique
//! index on `(student_id, schedule_id)`:
//! - opening only inserts when no row exists for the pair
//! - closing only updates a row whose `exit_timestamp` is still NULL
//!
//! SQLite serializes writers, so of two concurrent callers exactly one wins a
//! given transition and the other sees its effect.

use crate::db::models::{timestamp, AttendanceSession, SessionStatus};
use crate::error::AppResult;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Open a session for the pair unless one already exists
///
/// Returns `None` when a session (open or completed) is already there.
pub async fn open_session(
    pool: &SqlitePool,
    student_id: &str,
    schedule_id: &str,
    now: DateTime<Utc>,
) -> AppResult<Option<AttendanceSession>> {
    let session = AttendanceSession {
        id: Uuid::new_v4().to_string(),
        student_id: student_id.to_string(),
        schedule_id: schedule_id.to_string(),
        entry_timestamp: timestamp(now),
        exit_timestamp: None,
        status: SessionStatus::Present.as_str().to_string(),
    };

    let result = sqlx::query(
        "INSERT INTO attendance_sessions (id, student_id, schedule_id, entry_timestamp, exit_timestamp, status)
         VALUES (?, ?, ?, ?, NULL, ?)
         ON CONFLICT(student_id, schedule_id) DO NOTHING",
    )
    .bind(&session.id)
    .bind(&session.student_id)
    .bind(&session.schedule_id)
    .bind(&session.entry_timestamp)
    .bind(&session.status)
    .execute(pool)
    .await?;

    Ok((result.rows_affected() == 1).then_some(session))
}

/// Record the exit on the pair's open session
///
/// Returns `None` when there is no open session to close.
pub async fn close_session(
    pool: &SqlitePool,
    student_id: &str,
    schedule_id: &str,
    now: DateTime<Utc>,
) -> AppResult<Option<AttendanceSession>> {
    let session = sqlx::query_as::<_, AttendanceSession>(
        "UPDATE attendance_sessions
         SET exit_timestamp = ?, status = ?
         WHERE student_id = ? AND schedule_id = ? AND exit_timestamp IS NULL
         RETURNING *",
    )
    .bind(timestamp(now))
    .bind(SessionStatus::Completed.as_str())
    .bind(student_id)
    .bind(schedule_id)
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

pub async fn find_session(
    pool: &SqlitePool,
    student_id: &str,
    schedule_id: &str,
) -> AppResult<Option<AttendanceSession>> {
    let session = sqlx::query_as::<_, AttendanceSession>(
        "SELECT * FROM attendance_sessions WHERE student_id = ? AND schedule_id = ?",
    )
    .bind(student_id)
    .bind(schedule_id)
    .fetch_optional(pool)
    .await?;

    Ok(session)
}
