use std::collections::HashMap;

use sqlx::PgPool;

/// Repository for `likes` rows and the denormalised counters on `videos`
/// that the like/unlike path keeps in sync with them.
#[derive(Clone)]
pub struct LikeRepository {
    pool: PgPool,
}

impl LikeRepository {
    pub fn new(pool: PgPool) -> Self {
        LikeRepository { pool }
    }

    /// Inserts a like row, ignoring a unique-constraint violation on
    /// `(video_id, account_id)`. Returns `true` only if this call actually
    /// created the row, so callers know whether to bump counters.
    pub async fn create_like_ignore_duplicate(
        &self,
        video_id: u64,
        account_id: u64,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO likes (video_id, account_id, created_at)
            VALUES ($1, $2, now())
            ON CONFLICT (video_id, account_id) DO NOTHING
            "#,
        )
        .bind(video_id as i64)
        .bind(account_id as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes the like row for `(video_id, account_id)`. Returns `true` if a
    /// row was actually removed.
    pub async fn delete_like(&self, video_id: u64, account_id: u64) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"DELETE FROM likes WHERE video_id = $1 AND account_id = $2"#,
        )
        .bind(video_id as i64)
        .bind(account_id as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn is_liked(&self, video_id: u64, account_id: u64) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM likes WHERE video_id = $1 AND account_id = $2)"#,
        )
        .bind(video_id as i64)
        .bind(account_id as i64)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Batch liked-lookup for `buildFeedItems`. Returns an empty map
    /// immediately for `account_id == 0` or an empty `video_ids`, matching
    /// the anonymous-viewer short-circuit so anonymous responses never pay a
    /// DB round-trip they cannot use.
    pub async fn batch_get_liked(
        &self,
        account_id: u64,
        video_ids: &[u64],
    ) -> anyhow::Result<HashMap<u64, bool>> {
        if account_id == 0 || video_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids: Vec<i64> = video_ids.iter().map(|id| *id as i64).collect();
        let liked: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT video_id FROM likes
            WHERE account_id = $1 AND video_id = ANY($2)
            "#,
        )
        .bind(account_id as i64)
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let liked_set: std::collections::HashSet<i64> = liked.into_iter().collect();
        Ok(video_ids
            .iter()
            .map(|id| (*id, liked_set.contains(&(*id as i64))))
            .collect())
    }

    /// Increments `likes_count` by `delta` (clamped to zero), within the
    /// caller's transaction. `delta` is `+1` or `-1`.
    pub async fn bump_likes_count(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        video_id: u64,
        delta: i64,
    ) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE videos SET likes_count = GREATEST(likes_count + $1, 0) WHERE id = $2"#)
            .bind(delta)
            .bind(video_id as i64)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Increments `popularity` by `delta` (clamped to zero), within the
    /// caller's transaction.
    pub async fn bump_popularity(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        video_id: u64,
        delta: i64,
    ) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE videos SET popularity = GREATEST(popularity + $1, 0) WHERE id = $2"#)
            .bind(delta)
            .bind(video_id as i64)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn begin(&self) -> anyhow::Result<sqlx::Transaction<'_, sqlx::Postgres>> {
        Ok(self.pool.begin().await?)
    }
}
