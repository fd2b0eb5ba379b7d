//! Student rows and the passkey column.
//!
//! Every write of `passkey` is a single statement, so readers see either the
//! old code or the new one, never a mix. The partial unique index on active
//! students turns a collision into a constraint violation that callers retry.

use crate::db::models::{timestamp, Student};
use crate::error::{AppError, AppResult};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Outcome of trying to write a passkey code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasskeyWrite {
    Written,
    /// Another active student already holds this code
    Collision,
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Insert a student with the given code
///
/// Students are normally provisioned by the admin system; this is its write path.
/// Returns `None` when the code is already held by an active student.
pub async fn insert_student(
    pool: &SqlitePool,
    name: &str,
    passkey: &str,
) -> AppResult<Option<Student>> {
    let student = Student {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        passkey: passkey.to_string(),
        is_active: true,
        created_at: timestamp(Utc::now()),
    };

    let result = sqlx::query(
        "INSERT INTO students (id, name, passkey, is_active, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&student.id)
    .bind(&student.name)
    .bind(&student.passkey)
    .bind(student.is_active)
    .bind(&student.created_at)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(Some(student)),
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(AppError::Database(e)),
    }
}

pub async fn find_by_id(pool: &SqlitePool, student_id: &str) -> AppResult<Student> {
    sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = ?")
        .bind(student_id)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                AppError::NotFound(format!("Student with id '{}' not found", student_id))
            }
            _ => AppError::Database(e),
        })
}

/// Look up the active student currently holding `passkey`
pub async fn find_active_by_passkey(pool: &SqlitePool, passkey: &str) -> AppResult<Option<Student>> {
    let student = sqlx::query_as::<_, Student>(
        "SELECT * FROM students WHERE passkey = ? AND is_active = 1",
    )
    .bind(passkey)
    .fetch_optional(pool)
    .await?;

    Ok(student)
}

/// Replace a student's code in one statement
pub async fn replace_passkey(
    pool: &SqlitePool,
    student_id: &str,
    passkey: &str,
) -> AppResult<PasskeyWrite> {
    let result = sqlx::query("UPDATE students SET passkey = ? WHERE id = ?")
        .bind(passkey)
        .bind(student_id)
        .execute(pool)
        .await;

    match result {
        Ok(done) if done.rows_affected() == 0 => Err(AppError::NotFound(format!(
            "Student with id '{}' not found",
            student_id
        ))),
        Ok(_) => Ok(PasskeyWrite::Written),
        Err(e) if is_unique_violation(&e) => Ok(PasskeyWrite::Collision),
        Err(e) => Err(AppError::Database(e)),
    }
}

pub async fn set_active(pool: &SqlitePool, student_id: &str, active: bool) -> AppResult<()> {
    sqlx::query("UPDATE students SET is_active = ? WHERE id = ?")
        .bind(active)
        .bind(student_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    #[tokio::test]
    async fn test_active_code_is_unique() {
        let pool = connect_in_memory().await.unwrap();

        let ada = insert_student(&pool, "Ada", "111111").await.unwrap().unwrap();
        let clash = insert_student(&pool, "Grace", "111111").await.unwrap();
        assert!(clash.is_none());

        let grace = insert_student(&pool, "Grace", "222222").await.unwrap().unwrap();
        assert_eq!(
            replace_passkey(&pool, &grace.id, "111111").await.unwrap(),
            PasskeyWrite::Collision
        );

        // Inactive students release their code
        set_active(&pool, &ada.id, false).await.unwrap();
        assert_eq!(
            replace_passkey(&pool, &grace.id, "111111").await.unwrap(),
            PasskeyWrite::Written
        );
        let found = find_active_by_passkey(&pool, "111111").await.unwrap().unwrap();
        assert_eq!(found.id, grace.id);
    }

    #[tokio::test]
    async fn test_inactive_student_is_not_found() {
        let pool = connect_in_memory().await.unwrap();
        let student = insert_student(&pool, "Linus", "333333").await.unwrap().unwrap();

        set_active(&pool, &student.id, false).await.unwrap();
        assert!(find_active_by_passkey(&pool, "333333").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_unknown_student() {
        let pool = connect_in_memory().await.unwrap();
        let err = replace_passkey(&pool, "missing", "444444").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
