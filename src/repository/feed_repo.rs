use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::VideoRow;

/// Read-side keyset queries against the `videos` table across four
/// orderings. Each is deterministic and stateless: given the same cursor and
/// limit, it returns the same page regardless of call count.
#[derive(Clone)]
pub struct FeedRepository {
    pool: PgPool,
}

impl FeedRepository {
    pub fn new(pool: PgPool) -> Self {
        FeedRepository { pool }
    }

    /// Order by `create_time DESC`; `before` filters `create_time < before`
    /// when `Some`.
    pub async fn list_latest(
        &self,
        limit: i64,
        before: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<VideoRow>> {
        let rows = match before {
            Some(before) => {
                sqlx::query_as::<_, VideoRow>(
                    r#"
                    SELECT id, author_id, author_username, title, description,
                           play_url, cover_url, create_time, likes_count, popularity
                    FROM videos
                    WHERE create_time < $1
                    ORDER BY create_time DESC
                    LIMIT $2
                    "#,
                )
                .bind(before)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, VideoRow>(
                    r#"
                    SELECT id, author_id, author_username, title, description,
                           play_url, cover_url, create_time, likes_count, popularity
                    FROM videos
                    ORDER BY create_time DESC
                    LIMIT $1
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    /// Order by `(likes_count DESC, id DESC)`; strict lexicographic cursor
    /// matching the ORDER BY exactly: `(likes_count < c.l) OR (likes_count =
    /// c.l AND id < c.id)`.
    pub async fn list_by_likes_count(
        &self,
        limit: i64,
        cursor: Option<(i64, u64)>,
    ) -> anyhow::Result<Vec<VideoRow>> {
        let rows = match cursor {
            Some((likes_count, id)) => {
                sqlx::query_as::<_, VideoRow>(
                    r#"
                    SELECT id, author_id, author_username, title, description,
                           play_url, cover_url, create_time, likes_count, popularity
                    FROM videos
                    WHERE likes_count < $1 OR (likes_count = $1 AND id < $2)
                    ORDER BY likes_count DESC, id DESC
                    LIMIT $3
                    "#,
                )
                .bind(likes_count)
                .bind(id as i64)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, VideoRow>(
                    r#"
                    SELECT id, author_id, author_username, title, description,
                           play_url, cover_url, create_time, likes_count, popularity
                    FROM videos
                    ORDER BY likes_count DESC, id DESC
                    LIMIT $1
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    /// Order by `create_time DESC`, scoped to authors the viewer follows.
    pub async fn list_by_following(
        &self,
        viewer_id: u64,
        limit: i64,
        before: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<VideoRow>> {
        let rows = match before {
            Some(before) => {
                sqlx::query_as::<_, VideoRow>(
                    r#"
                    SELECT id, author_id, author_username, title, description,
                           play_url, cover_url, create_time, likes_count, popularity
                    FROM videos
                    WHERE create_time < $1
                      AND author_id IN (
                          SELECT vlogger_id FROM follows WHERE follower_id = $2
                      )
                    ORDER BY create_time DESC
                    LIMIT $3
                    "#,
                )
                .bind(before)
                .bind(viewer_id as i64)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, VideoRow>(
                    r#"
                    SELECT id, author_id, author_username, title, description,
                           play_url, cover_url, create_time, likes_count, popularity
                    FROM videos
                    WHERE author_id IN (
                        SELECT vlogger_id FROM follows WHERE follower_id = $1
                    )
                    ORDER BY create_time DESC
                    LIMIT $2
                    "#,
                )
                .bind(viewer_id as i64)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    /// Order by `(popularity DESC, create_time DESC, id DESC)`; three-clause
    /// disjunctive strict cursor on the triple. Used as the popularity feed's
    /// DB fallback when the cache path is unavailable or empty at offset 0.
    pub async fn list_by_popularity(
        &self,
        limit: i64,
        cursor: Option<(i64, DateTime<Utc>, u64)>,
    ) -> anyhow::Result<Vec<VideoRow>> {
        let rows = match cursor {
            Some((popularity, before, id)) => {
                sqlx::query_as::<_, VideoRow>(
                    r#"
                    SELECT id, author_id, author_username, title, description,
                           play_url, cover_url, create_time, likes_count, popularity
                    FROM videos
                    WHERE popularity < $1
                       OR (popularity = $1 AND create_time < $2)
                       OR (popularity = $1 AND create_time = $2 AND id < $3)
                    ORDER BY popularity DESC, create_time DESC, id DESC
                    LIMIT $4
                    "#,
                )
                .bind(popularity)
                .bind(before)
                .bind(id as i64)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, VideoRow>(
                    r#"
                    SELECT id, author_id, author_username, title, description,
                           play_url, cover_url, create_time, likes_count, popularity
                    FROM videos
                    ORDER BY popularity DESC, create_time DESC, id DESC
                    LIMIT $1
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    /// Fetch videos by id; result order is undefined, callers re-order.
    pub async fn get_by_ids(&self, ids: &[u64]) -> anyhow::Result<Vec<VideoRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = ids.iter().map(|id| *id as i64).collect();
        let rows = sqlx::query_as::<_, VideoRow>(
            r#"
            SELECT id, author_id, author_username, title, description,
                   play_url, cover_url, create_time, likes_count, popularity
            FROM videos
            WHERE id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn exists(&self, video_id: u64) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM videos WHERE id = $1)"#,
        )
        .bind(video_id as i64)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

/// `has_more` is derived as `len(rows) == limit`, never from a separate count
/// query.
pub fn has_more(rows_len: usize, limit: i64) -> bool {
    rows_len as i64 == limit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_more_true_when_page_full() {
        assert!(has_more(10, 10));
    }

    #[test]
    fn has_more_false_when_page_short() {
        assert!(!has_more(3, 10));
    }

    #[test]
    fn has_more_false_on_empty_page() {
        assert!(!has_more(0, 10));
    }
}
