use crate::broker::events::{CommentAction, CommentEvent};
use crate::broker::{DeliveredMessage, EventConsumer};
use crate::repository::CommentRepository;

/// Consumes `comment.events`. On `publish`, inserts the comment row if it
/// isn't already present (the HTTP path inserts synchronously and republishes
/// with the assigned id, so in normal operation this is an idempotent
/// no-op — see `CommentService::publish`). On `delete`, removes the row.
/// Neither path applies a popularity delta; that asymmetry with like/unlike
/// is preserved from the system this was ported from (SPEC_FULL.md §9).
pub struct CommentWorker {
    consumer: EventConsumer,
    comment_repo: CommentRepository,
    pool: sqlx::PgPool,
}

impl CommentWorker {
    pub fn new(consumer: EventConsumer, comment_repo: CommentRepository, pool: sqlx::PgPool) -> Self {
        CommentWorker {
            consumer,
            comment_repo,
            pool,
        }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        self.consumer
            .run(|msg: DeliveredMessage| async move { self.handle(msg).await })
            .await
    }

    async fn handle(&self, msg: DeliveredMessage) -> anyhow::Result<bool> {
        let event: CommentEvent = match serde_json::from_slice(&msg.payload) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, "dropping malformed comment event");
                return Ok(false);
            }
        };

        match event.action {
            CommentAction::Publish => self.apply_publish(&event).await?,
            CommentAction::Delete => self.apply_delete(&event).await?,
        }
        Ok(true)
    }

    async fn apply_publish(&self, event: &CommentEvent) -> anyhow::Result<()> {
        let (Some(comment_id), Some(video_id), Some(author_id), Some(content)) = (
            event.comment_id,
            event.video_id,
            event.author_id,
            event.content.as_ref(),
        ) else {
            tracing::debug!("dropping comment publish event missing required fields");
            return Ok(());
        };
        let username = event.username.clone().unwrap_or_default();

        sqlx::query(
            r#"
            INSERT INTO comments (id, video_id, author_id, author_username, content, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(comment_id as i64)
        .bind(video_id as i64)
        .bind(author_id as i64)
        .bind(&username)
        .bind(content)
        .bind(event.occurred_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn apply_delete(&self, event: &CommentEvent) -> anyhow::Result<()> {
        let Some(comment_id) = event.comment_id else {
            tracing::debug!("dropping comment delete event missing comment_id");
            return Ok(());
        };
        self.comment_repo.delete(comment_id).await?;
        Ok(())
    }
}
