//! # Credential Database Operations
//!
//! CRUD for registered public-key credentials.
//!
//! ## Security Note
//! Only public keys are stored - private keys never leave the student's device.

use crate::db::models::{timestamp, StudentCredential};
use crate::error::{AppError, AppResult};
use chrono::Utc;
use sqlx::SqlitePool;

/// Save a credential produced by a completed registration ceremony
pub async fn save_credential(
    pool: &SqlitePool,
    credential_id: &str,
    student_id: &str,
    credential: &[u8],
    sign_count: u32,
    device_name: &str,
) -> AppResult<StudentCredential> {
    let stored = StudentCredential {
        id: credential_id.to_string(),
        student_id: student_id.to_string(),
        credential: credential.to_vec(),
        sign_count: i64::from(sign_count),
        device_name: device_name.to_string(),
        created_at: timestamp(Utc::now()),
        last_used_at: None,
    };

    sqlx::query(
        "INSERT INTO student_credentials
         (id, student_id, credential, sign_count, device_name, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&stored.id)
    .bind(&stored.student_id)
    .bind(&stored.credential)
    .bind(stored.sign_count)
    .bind(&stored.device_name)
    .bind(&stored.created_at)
    .execute(pool)
    .await
    .map_err(|e| {
        if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
            AppError::BadRequest("This authenticator is already registered".to_string())
        } else {
            AppError::Database(e)
        }
    })?;

    Ok(stored)
}

/// All credentials a student has registered, oldest first
///
/// Returns an empty vector when the student has none.
pub async fn find_by_student_id(
    pool: &SqlitePool,
    student_id: &str,
) -> AppResult<Vec<StudentCredential>> {
    let credentials = sqlx::query_as::<_, StudentCredential>(
        "SELECT * FROM student_credentials WHERE student_id = ? ORDER BY created_at ASC",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(credentials)
}

/// Advance the signature counter, but only forwards
///
/// This is a compare-and-set: the row is updated only when `new_count` is
/// strictly greater than what is stored, so two racing verifications of the
/// same assertion cannot both succeed. Returns `false` when the stored counter
/// was already at or past `new_count`.
///
/// `refreshed` replaces the serialized credential record when the ceremony
/// library produced an updated one.
pub async fn advance_sign_count(
    pool: &SqlitePool,
    credential_id: &str,
    new_count: u32,
    refreshed: Option<&[u8]>,
) -> AppResult<bool> {
    let now = timestamp(Utc::now());

    let result = sqlx::query(
        "UPDATE student_credentials
         SET sign_count = ?, last_used_at = ?, credential = COALESCE(?, credential)
         WHERE id = ? AND sign_count < ?",
    )
    .bind(i64::from(new_count))
    .bind(now)
    .bind(refreshed)
    .bind(credential_id)
    .bind(i64::from(new_count))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Delete one of the caller's own credentials
pub async fn delete_credential(
    pool: &SqlitePool,
    student_id: &str,
    credential_id: &str,
) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM student_credentials WHERE id = ? AND student_id = ?")
        .bind(credential_id)
        .bind(student_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Credential '{}' not found",
            credential_id
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect_in_memory, students};

    #[tokio::test]
    async fn test_sign_count_only_moves_forward() {
        let pool = connect_in_memory().await.unwrap();
        let student = students::insert_student(&pool, "Ada", "123456").await.unwrap().unwrap();
        save_credential(&pool, "cred-1", &student.id, b"{}", 3, "Phone").await.unwrap();

        assert!(!advance_sign_count(&pool, "cred-1", 3, None).await.unwrap());
        assert!(!advance_sign_count(&pool, "cred-1", 2, None).await.unwrap());
        assert!(advance_sign_count(&pool, "cred-1", 4, Some(b"{\"v\":2}")).await.unwrap());

        let stored = find_by_student_id(&pool, &student.id).await.unwrap();
        assert_eq!(stored[0].sign_count, 4);
        assert_eq!(stored[0].credential, b"{\"v\":2}".to_vec());
        assert!(stored[0].last_used_at.is_some());
    }

    #[tokio::test]
    async fn test_delete_is_scoped_to_owner() {
        let pool = connect_in_memory().await.unwrap();
        let ada = students::insert_student(&pool, "Ada", "123456").await.unwrap().unwrap();
        let bob = students::insert_student(&pool, "Bob", "654321").await.unwrap().unwrap();
        save_credential(&pool, "cred-ada", &ada.id, b"{}", 0, "Laptop").await.unwrap();

        let err = delete_credential(&pool, &bob.id, "cred-ada").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        delete_credential(&pool, &ada.id, "cred-ada").await.unwrap();
        assert!(find_by_student_id(&pool, &ada.id).await.unwrap().is_empty());
    }
}
