//! Read access to the schedule table.
//!
//! Schedules are written by the admin system; the kiosk only ever reads them.
//! `insert_schedule` exists for provisioning and tests.

use crate::db::models::{timestamp, Schedule};
use crate::error::AppResult;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

pub async fn insert_schedule(
    pool: &SqlitePool,
    location: &str,
    title: &str,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> AppResult<Schedule> {
    let schedule = Schedule {
        id: Uuid::new_v4().to_string(),
        location: location.to_string(),
        title: title.to_string(),
        starts_at: timestamp(starts_at),
        ends_at: timestamp(ends_at),
    };

    sqlx::query(
        "INSERT INTO schedules (id, location, title, starts_at, ends_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&schedule.id)
    .bind(&schedule.location)
    .bind(&schedule.title)
    .bind(&schedule.starts_at)
    .bind(&schedule.ends_at)
    .execute(pool)
    .await?;

    Ok(schedule)
}

/// Schedules at `location` overlapping `[from, until]`, earliest start first
pub async fn find_overlapping(
    pool: &SqlitePool,
    location: &str,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> AppResult<Vec<Schedule>> {
    let schedules = sqlx::query_as::<_, Schedule>(
        "SELECT * FROM schedules
         WHERE location = ? AND ends_at >= ? AND starts_at <= ?
         ORDER BY starts_at ASC",
    )
    .bind(location)
    .bind(timestamp(from))
    .bind(timestamp(until))
    .fetch_all(pool)
    .await?;

    Ok(schedules)
}

/// The first schedule at `location` starting after `after`
pub async fn find_next(
    pool: &SqlitePool,
    location: &str,
    after: DateTime<Utc>,
) -> AppResult<Option<Schedule>> {
    let schedule = sqlx::query_as::<_, Schedule>(
        "SELECT * FROM schedules
         WHERE location = ? AND starts_at > ?
         ORDER BY starts_at ASC
         LIMIT 1",
    )
    .bind(location)
    .bind(timestamp(after))
    .fetch_optional(pool)
    .await?;

    Ok(schedule)
}
