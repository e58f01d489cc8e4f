use sqlx::PgPool;

use crate::models::CommentRow;

#[derive(Clone)]
pub struct CommentRepository {
    pool: PgPool,
}

impl CommentRepository {
    pub fn new(pool: PgPool) -> Self {
        CommentRepository { pool }
    }

    pub async fn create(
        &self,
        video_id: u64,
        author_id: u64,
        author_username: &str,
        content: &str,
    ) -> anyhow::Result<CommentRow> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            INSERT INTO comments (video_id, author_id, author_username, content, created_at)
            VALUES ($1, $2, $3, $4, now())
            RETURNING id, video_id, author_id, author_username, content, created_at
            "#,
        )
        .bind(video_id as i64)
        .bind(author_id as i64)
        .bind(author_username)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get(&self, comment_id: u64) -> anyhow::Result<Option<CommentRow>> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, video_id, author_id, author_username, content, created_at
            FROM comments WHERE id = $1
            "#,
        )
        .bind(comment_id as i64)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Removes a comment row. Returns `true` if a row was deleted. Does not
    /// touch `popularity` — the comment-delete path applies no popularity
    /// delta on either the worker or the fallback path (see SPEC_FULL.md §9,
    /// preserved asymmetry with like/unlike).
    pub async fn delete(&self, comment_id: u64) -> anyhow::Result<bool> {
        let result = sqlx::query(r#"DELETE FROM comments WHERE id = $1"#)
            .bind(comment_id as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
