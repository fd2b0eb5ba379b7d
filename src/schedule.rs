//! # Schedule Resolver
//!
//! Answers "which class is this kiosk checking students into right now?".
//!
//! The schedule table belongs to the admin system, so the resolver sits behind
//! a trait: the toggle engine and the banner endpoint only see
//! [`ScheduleResolver`], and [`SqlScheduleResolver`] is the implementation
//! reading the shared database.

use crate::db::models::{parse_timestamp, Schedule};
use crate::db::schedules;
use crate::error::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

#[async_trait]
pub trait ScheduleResolver: Send + Sync {
    /// The schedule scans at `location` count towards at `now`, if any
    async fn active_schedule(&self, location: &str, now: DateTime<Utc>) -> AppResult<Option<Schedule>>;

    /// The active schedule, or else the next one to start at `location`
    async fn current_or_next(&self, location: &str, now: DateTime<Utc>) -> AppResult<Option<Schedule>>;
}

/// Resolver over the `schedules` table with a grace window
///
/// A schedule is active from `grace` before it starts until `grace` after it
/// ends. When windows overlap (back-to-back classes in one room), a class that
/// is actually running wins; otherwise the one whose start is closest to `now`.
pub struct SqlScheduleResolver {
    pool: SqlitePool,
    grace: chrono::Duration,
}

impl SqlScheduleResolver {
    pub fn new(pool: SqlitePool, grace: std::time::Duration) -> Self {
        Self {
            pool,
            grace: chrono::Duration::from_std(grace).unwrap_or_else(|_| chrono::Duration::minutes(15)),
        }
    }
}

fn pick_active(candidates: Vec<Schedule>, now: DateTime<Utc>) -> AppResult<Option<Schedule>> {
    let mut best: Option<(bool, i64, Schedule)> = None;

    for schedule in candidates {
        let starts = parse_timestamp(&schedule.starts_at)?;
        let ends = parse_timestamp(&schedule.ends_at)?;
        let running = starts <= now && now <= ends;
        let distance = (starts - now).num_seconds().abs();

        let better = match &best {
            None => true,
            Some((best_running, best_distance, _)) => {
                (running && !best_running) || (running == *best_running && distance < *best_distance)
            }
        };
        if better {
            best = Some((running, distance, schedule));
        }
    }

    Ok(best.map(|(_, _, schedule)| schedule))
}

#[async_trait]
impl ScheduleResolver for SqlScheduleResolver {
    async fn active_schedule(&self, location: &str, now: DateTime<Utc>) -> AppResult<Option<Schedule>> {
        let candidates =
            schedules::find_overlapping(&self.pool, location, now - self.grace, now + self.grace).await?;
        pick_active(candidates, now)
    }

    async fn current_or_next(&self, location: &str, now: DateTime<Utc>) -> AppResult<Option<Schedule>> {
        if let Some(active) = self.active_schedule(location, now).await? {
            return Ok(Some(active));
        }
        schedules::find_next(&self.pool, location, now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use chrono::{Duration, TimeZone};
    use std::time::Duration as StdDuration;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, hour, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn test_grace_window() {
        let pool = connect_in_memory().await.unwrap();
        let class = schedules::insert_schedule(&pool, "Room 101", "Algebra", at(9, 0), at(10, 0))
            .await
            .unwrap();
        let resolver = SqlScheduleResolver::new(pool, StdDuration::from_secs(15 * 60));

        for now in [at(8, 45), at(9, 30), at(10, 15)] {
            let found = resolver.active_schedule("Room 101", now).await.unwrap();
            assert_eq!(found.map(|s| s.id), Some(class.id.clone()), "at {}", now);
        }
        assert!(resolver.active_schedule("Room 101", at(8, 44)).await.unwrap().is_none());
        assert!(resolver.active_schedule("Room 101", at(10, 16)).await.unwrap().is_none());
        assert!(resolver.active_schedule("Room 202", at(9, 30)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_running_class_wins_over_next_in_grace() {
        let pool = connect_in_memory().await.unwrap();
        let first = schedules::insert_schedule(&pool, "Lab", "Chemistry", at(9, 0), at(10, 0))
            .await
            .unwrap();
        let second = schedules::insert_schedule(&pool, "Lab", "Physics", at(10, 5), at(11, 0))
            .await
            .unwrap();
        let resolver = SqlScheduleResolver::new(pool, StdDuration::from_secs(15 * 60));

        let during_first = resolver.active_schedule("Lab", at(9, 55)).await.unwrap().unwrap();
        assert_eq!(during_first.id, first.id);

        let between = resolver.active_schedule("Lab", at(10, 3)).await.unwrap().unwrap();
        assert_eq!(between.id, second.id);
    }

    #[tokio::test]
    async fn test_banner_falls_back_to_next() {
        let pool = connect_in_memory().await.unwrap();
        let later = schedules::insert_schedule(&pool, "Hall", "History", at(14, 0), at(15, 0))
            .await
            .unwrap();
        let resolver = SqlScheduleResolver::new(pool, StdDuration::from_secs(15 * 60));

        assert!(resolver.active_schedule("Hall", at(9, 0)).await.unwrap().is_none());
        let banner = resolver.current_or_next("Hall", at(9, 0)).await.unwrap().unwrap();
        assert_eq!(banner.id, later.id);
        assert!(resolver
            .current_or_next("Hall", at(9, 0) + Duration::hours(8))
            .await
            .unwrap()
            .is_none());
    }
}
