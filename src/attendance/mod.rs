//! # Attendance Toggle Engine
//!
//! Decides, from one scan, whether a student is arriving, leaving, or already
//! done with the current class, and records it.
//!
//! ## Decision
//! | existing session for (student, schedule) | action              | write        |
//! |------------------------------------------|---------------------|--------------|
//! | none                                     | `ENTRY`             | open session |
//! | open (no exit time)                      | `EXIT`              | set exit     |
//! | completed                                | `ALREADY_COMPLETED` | none         |
//!
//! Each write is one conditional statement (see [`crate::db::attendance`]), so
//! a second scan racing the first observes the first one's effect and answers
//! with the next state instead of failing.

pub mod types;

pub use types::{
    AttendanceAction, AuthenticatedStudent, CurrentSchedule, ScanOutcome, ScanRequest, ScheduleQuery,
    ScheduleSummary, StudentSummary,
};

use crate::db::attendance;
use crate::db::models::timestamp;
use crate::error::{AppError, AppResult};
use crate::schedule::ScheduleResolver;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Apply the toggle to one (student, schedule) pair
pub async fn toggle(
    pool: &SqlitePool,
    student_id: &str,
    schedule_id: &str,
    now: DateTime<Utc>,
) -> AppResult<AttendanceAction> {
    if attendance::open_session(pool, student_id, schedule_id, now).await?.is_some() {
        return Ok(AttendanceAction::Entry);
    }

    if attendance::close_session(pool, student_id, schedule_id, now).await?.is_some() {
        return Ok(AttendanceAction::Exit);
    }

    // The insert found a row and the update found it already closed. Rows are
    // never deleted here, so the session is complete.
    Ok(AttendanceAction::AlreadyCompleted)
}

/// Record a scan for `student` at the kiosk in `location`
pub async fn record_scan(
    pool: &SqlitePool,
    resolver: &dyn ScheduleResolver,
    student: &AuthenticatedStudent,
    location: &str,
    now: DateTime<Utc>,
) -> AppResult<ScanOutcome> {
    let schedule = resolver
        .active_schedule(location, now)
        .await?
        .ok_or(AppError::NoActiveSchedule)?;

    let action = toggle(pool, &student.id, &schedule.id, now).await?;

    tracing::info!(
        student_id = %student.id,
        schedule_id = %schedule.id,
        location,
        ?action,
        "attendance recorded"
    );

    Ok(ScanOutcome {
        student: student.into(),
        action,
        schedule: schedule.into(),
        timestamp: timestamp(now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Student;
    use crate::db::{connect_in_memory, schedules, students};
    use crate::schedule::SqlScheduleResolver;
    use chrono::{Duration, TimeZone};
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    struct Fixture {
        pool: SqlitePool,
        resolver: SqlScheduleResolver,
        student: AuthenticatedStudent,
        schedule_id: String,
        start: DateTime<Utc>,
    }

    async fn fixture() -> Fixture {
        let pool = connect_in_memory().await.unwrap();
        let start = Utc.with_ymd_and_hms(2024, 9, 2, 9, 0, 0).unwrap();
        let schedule = schedules::insert_schedule(&pool, "Room 101", "Algebra", start, start + Duration::hours(1))
            .await
            .unwrap();
        let student: Student = students::insert_student(&pool, "Ada", "482913").await.unwrap().unwrap();
        let resolver = SqlScheduleResolver::new(pool.clone(), StdDuration::from_secs(15 * 60));

        Fixture {
            pool,
            resolver,
            student: student.into(),
            schedule_id: schedule.id,
            start,
        }
    }

    #[tokio::test]
    async fn test_entry_exit_then_completed() {
        let f = fixture().await;
        let t1 = f.start + Duration::minutes(2);
        let t2 = f.start + Duration::minutes(50);
        let t3 = f.start + Duration::minutes(55);

        let first = record_scan(&f.pool, &f.resolver, &f.student, "Room 101", t1).await.unwrap();
        assert_eq!(first.action, AttendanceAction::Entry);
        assert_eq!(first.schedule.id, f.schedule_id);
        assert_eq!(first.student.name, "Ada");

        let session = attendance::find_session(&f.pool, &f.student.id, &f.schedule_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.entry_timestamp, timestamp(t1));
        assert!(session.exit_timestamp.is_none());
        assert_eq!(session.status, "PRESENT");

        let second = record_scan(&f.pool, &f.resolver, &f.student, "Room 101", t2).await.unwrap();
        assert_eq!(second.action, AttendanceAction::Exit);

        let third = record_scan(&f.pool, &f.resolver, &f.student, "Room 101", t3).await.unwrap();
        assert_eq!(third.action, AttendanceAction::AlreadyCompleted);

        let session = attendance::find_session(&f.pool, &f.student.id, &f.schedule_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.entry_timestamp, timestamp(t1));
        assert_eq!(session.exit_timestamp, Some(timestamp(t2)));
        assert_eq!(session.status, "COMPLETED");
    }

    #[tokio::test]
    async fn test_concurrent_scans_never_double_enter() {
        let f = fixture().await;
        let now = f.start + Duration::minutes(1);

        let (a, b) = tokio::join!(
            record_scan(&f.pool, &f.resolver, &f.student, "Room 101", now),
            record_scan(&f.pool, &f.resolver, &f.student, "Room 101", now),
        );
        let mut actions = vec![a.unwrap().action, b.unwrap().action];
        actions.sort_by_key(|action| *action as u8);

        assert_eq!(actions, vec![AttendanceAction::Entry, AttendanceAction::Exit]);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attendance_sessions")
            .fetch_one(&f.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_scans_on_shared_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("attendance.db"))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(StdDuration::from_secs(30));
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let start = Utc.with_ymd_and_hms(2024, 9, 2, 9, 0, 0).unwrap();
        schedules::insert_schedule(&pool, "Room 101", "Algebra", start, start + Duration::hours(1))
            .await
            .unwrap();
        let resolver = Arc::new(SqlScheduleResolver::new(pool.clone(), StdDuration::from_secs(15 * 60)));
        let now = start + Duration::minutes(5);

        let mut roster = Vec::new();
        for i in 0..10 {
            let student = students::insert_student(&pool, &format!("Student {}", i), &format!("5000{:02}", i))
                .await
                .unwrap()
                .unwrap();
            roster.push(AuthenticatedStudent::from(student));
        }

        let mut scans = Vec::new();
        for student in &roster {
            for _ in 0..4 {
                let pool = pool.clone();
                let resolver = Arc::clone(&resolver);
                let student = student.clone();
                scans.push(tokio::spawn(async move {
                    let outcome = record_scan(&pool, resolver.as_ref(), &student, "Room 101", now).await.unwrap();
                    (student.id, outcome.action)
                }));
            }
        }

        let mut per_student: std::collections::HashMap<String, Vec<AttendanceAction>> = Default::default();
        for scan in scans {
            let (id, action) = scan.await.unwrap();
            per_student.entry(id).or_default().push(action);
        }

        assert_eq!(per_student.len(), roster.len());
        for (id, mut actions) in per_student {
            actions.sort_by_key(|action| *action as u8);
            assert_eq!(
                actions,
                vec![
                    AttendanceAction::Entry,
                    AttendanceAction::Exit,
                    AttendanceAction::AlreadyCompleted,
                    AttendanceAction::AlreadyCompleted,
                ],
                "student {}",
                id
            );
        }

        let open: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attendance_sessions WHERE exit_timestamp IS NULL")
            .fetch_one(&pool)
            .await
            .unwrap();
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attendance_sessions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(open, 0);
        assert_eq!(total, 10);
    }

    #[tokio::test]
    async fn test_no_schedule_means_no_write() {
        let f = fixture().await;
        let evening = f.start + Duration::hours(10);

        let err = record_scan(&f.pool, &f.resolver, &f.student, "Room 101", evening)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoActiveSchedule));

        let err = record_scan(&f.pool, &f.resolver, &f.student, "Gym", f.start)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoActiveSchedule));

        assert!(attendance::find_session(&f.pool, &f.student.id, &f.schedule_id)
            .await
            .unwrap()
            .is_none());
    }
}
