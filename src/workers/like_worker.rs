use crate::broker::events::{LikeAction, LikeEvent};
use crate::broker::{DeliveredMessage, EventConsumer};
use crate::repository::{FeedRepository, LikeRepository};

/// Consumes `like.events` and applies the persisted effect idempotently.
/// Ack (commit) only after the DB transaction that mutates counters commits;
/// a malformed payload is Acked and dropped rather than retried forever.
///
/// Does not touch the Redis popularity bucket: `LikeService::apply` already
/// publishes a separate `PopularityEvent` to `video.popularity.events` for
/// every like/unlike, and `PopularityWorker` is the sole consumer of that
/// topic. Applying the delta here too would double-count it.
pub struct LikeWorker {
    consumer: EventConsumer,
    feed_repo: FeedRepository,
    like_repo: LikeRepository,
}

impl LikeWorker {
    pub fn new(consumer: EventConsumer, feed_repo: FeedRepository, like_repo: LikeRepository) -> Self {
        LikeWorker {
            consumer,
            feed_repo,
            like_repo,
        }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        self.consumer
            .run(|msg: DeliveredMessage| async move { self.handle(msg).await })
            .await
    }

    async fn handle(&self, msg: DeliveredMessage) -> anyhow::Result<bool> {
        let event: LikeEvent = match serde_json::from_slice(&msg.payload) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, "dropping malformed like event");
                return Ok(false);
            }
        };

        if event.video_id == 0 || event.user_id == 0 {
            tracing::debug!("dropping like event with zero id");
            return Ok(false);
        }

        if !self.feed_repo.exists(event.video_id).await? {
            tracing::debug!(video_id = event.video_id, "dropping like event for deleted video");
            return Ok(false);
        }

        match event.action {
            LikeAction::Like => self.apply_like(&event).await?,
            LikeAction::Unlike => self.apply_unlike(&event).await?,
        }
        Ok(true)
    }

    async fn apply_like(&self, event: &LikeEvent) -> anyhow::Result<()> {
        let mut tx = self.like_repo.begin().await?;
        let created = sqlx::query(
            r#"
            INSERT INTO likes (video_id, account_id, created_at)
            VALUES ($1, $2, now())
            ON CONFLICT (video_id, account_id) DO NOTHING
            "#,
        )
        .bind(event.video_id as i64)
        .bind(event.user_id as i64)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if created {
            self.like_repo.bump_likes_count(&mut tx, event.video_id, 1).await?;
            self.like_repo.bump_popularity(&mut tx, event.video_id, 1).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn apply_unlike(&self, event: &LikeEvent) -> anyhow::Result<()> {
        let mut tx = self.like_repo.begin().await?;
        let deleted = sqlx::query(r#"DELETE FROM likes WHERE video_id = $1 AND account_id = $2"#)
            .bind(event.video_id as i64)
            .bind(event.user_id as i64)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if deleted {
            self.like_repo.bump_likes_count(&mut tx, event.video_id, -1).await?;
            self.like_repo.bump_popularity(&mut tx, event.video_id, -1).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
