//! # Database Module
//!
//! This module organizes all database-related code into submodules:
//! - `models`: Row types (Student, Credential, Challenge, Schedule, AttendanceSession)
//! - `students`: Student lookup and passkey rotation
//! - `credentials`: CRUD operations for registered public-key credentials
//! - `challenges`: Pending ceremony challenges (consume-once)
//! - `schedules`: Read access to the admin-owned schedule table
//! - `attendance`: Attendance session rows and their atomic transitions

pub mod attendance;
pub mod challenges;
pub mod credentials;
pub mod models;
pub mod schedules;
pub mod students;

use crate::error::AppResult;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// Connect to the database and bring the schema up to date
pub async fn connect(database_url: &str) -> AppResult<SqlitePool> {
    let pool = SqlitePool::connect(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// A migrated in-memory database
///
/// An in-memory SQLite database lives only as long as its connection, so the
/// pool is pinned to a single connection that is never recycled.
pub async fn connect_in_memory() -> AppResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}
