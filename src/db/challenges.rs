use crate::db::models::{timestamp, PendingChallenge};
use crate::error::AppResult;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

pub async fn save_challenge(pool: &SqlitePool, challenge: &PendingChallenge) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO pending_challenges (id, student_id, purpose, nonce, state, created_at, expires_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&challenge.id)
    .bind(&challenge.student_id)
    .bind(&challenge.purpose)
    .bind(&challenge.nonce)
    .bind(&challenge.state)
    .bind(&challenge.created_at)
    .bind(&challenge.expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete the challenge carrying `nonce` and hand back what was deleted
///
/// Deletion and read are one statement, so of two callers presenting the same
/// nonce exactly one gets the row. The row is gone afterwards whether or not
/// the caller goes on to verify successfully.
pub async fn take_by_nonce(pool: &SqlitePool, nonce: &str) -> AppResult<Option<PendingChallenge>> {
    let challenge = sqlx::query_as::<_, PendingChallenge>(
        "DELETE FROM pending_challenges WHERE nonce = ? RETURNING *",
    )
    .bind(nonce)
    .fetch_optional(pool)
    .await?;

    Ok(challenge)
}

// Cleanup expired challenges (run periodically from main)
pub async fn cleanup_expired_challenges(pool: &SqlitePool, now: DateTime<Utc>) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM pending_challenges WHERE expires_at < ?")
        .bind(timestamp(now))
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ChallengePurpose;
    use crate::db::{connect_in_memory, students};
    use std::time::Duration;

    #[tokio::test]
    async fn test_take_is_consume_once() {
        let pool = connect_in_memory().await.unwrap();
        let student = students::insert_student(&pool, "Ada", "123456").await.unwrap().unwrap();
        let challenge = PendingChallenge::new(
            student.id.clone(),
            ChallengePurpose::Authentication,
            "abc".into(),
            b"state".to_vec(),
            Utc::now(),
            Duration::from_secs(300),
        );
        save_challenge(&pool, &challenge).await.unwrap();

        let taken = take_by_nonce(&pool, "abc").await.unwrap().unwrap();
        assert_eq!(taken.id, challenge.id);
        assert_eq!(taken.state, b"state".to_vec());
        assert!(take_by_nonce(&pool, "abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired() {
        let pool = connect_in_memory().await.unwrap();
        let student = students::insert_student(&pool, "Ada", "123456").await.unwrap().unwrap();
        let now = Utc::now();

        for (nonce, ttl) in [("old", 10), ("fresh", 600)] {
            let challenge = PendingChallenge::new(
                student.id.clone(),
                ChallengePurpose::Registration,
                nonce.into(),
                vec![],
                now,
                Duration::from_secs(ttl),
            );
            save_challenge(&pool, &challenge).await.unwrap();
        }

        let removed = cleanup_expired_challenges(&pool, now + chrono::Duration::seconds(60))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(take_by_nonce(&pool, "old").await.unwrap().is_none());
        assert!(take_by_nonce(&pool, "fresh").await.unwrap().is_some());
    }
}
