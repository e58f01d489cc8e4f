use std::time::Duration;

use chrono::Utc;

use crate::broker::events::{LikeAction, LikeEvent};
use crate::broker::{EventProducer, TOPIC_LIKE_EVENTS, TOPIC_POPULARITY_EVENTS};
use crate::broker::events::PopularityEvent;
use crate::error::{AppError, AppResult};
use crate::repository::{FeedRepository, LikeRepository};
use crate::services::popularity_cache::PopularityCache;

const PUBLISH_DEADLINE: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct LikeService {
    feed_repo: FeedRepository,
    like_repo: LikeRepository,
    producer: EventProducer,
    popularity: PopularityCache,
}

impl LikeService {
    pub fn new(
        feed_repo: FeedRepository,
        like_repo: LikeRepository,
        producer: EventProducer,
        popularity: PopularityCache,
    ) -> Self {
        LikeService {
            feed_repo,
            like_repo,
            producer,
            popularity,
        }
    }

    pub async fn like(&self, account_id: u64, video_id: u64) -> AppResult<()> {
        self.apply(account_id, video_id, LikeAction::Like, 1).await
    }

    pub async fn unlike(&self, account_id: u64, video_id: u64) -> AppResult<()> {
        self.apply(account_id, video_id, LikeAction::Unlike, -1).await
    }

    async fn apply(
        &self,
        account_id: u64,
        video_id: u64,
        action: LikeAction,
        delta: i64,
    ) -> AppResult<()> {
        if account_id == 0 {
            return Err(AppError::Unauthorized);
        }
        if !self
            .feed_repo
            .exists(video_id)
            .await
            .map_err(AppError::Internal)?
        {
            return Err(AppError::NotFound(format!("video {video_id} not found")));
        }

        let occurred_at = Utc::now();
        let like_event = LikeEvent {
            event_id: crate::broker::events::new_event_id(),
            action: action.clone(),
            user_id: account_id,
            video_id,
            occurred_at,
        };
        let routing_key = match action {
            LikeAction::Like => "like.like",
            LikeAction::Unlike => "like.unlike",
        };

        let mysql_enqueued = self
            .producer
            .publish(TOPIC_LIKE_EVENTS, routing_key, &like_event, PUBLISH_DEADLINE)
            .await
            .is_ok();

        let popularity_event = PopularityEvent::update(video_id, delta, occurred_at);
        let cache_enqueued = self
            .producer
            .publish(
                TOPIC_POPULARITY_EVENTS,
                "video.popularity.update",
                &popularity_event,
                PUBLISH_DEADLINE,
            )
            .await
            .is_ok();

        if mysql_enqueued && cache_enqueued {
            return Ok(());
        }

        if !mysql_enqueued {
            self.inline_db_fallback(account_id, video_id, action, delta).await?;
        }
        if !cache_enqueued {
            if let Err(err) = self.popularity.apply_delta(video_id, delta, occurred_at).await {
                tracing::warn!(error = %err, video_id, "inline cache fallback failed");
            }
        }

        Ok(())
    }

    /// Inline DB write used when the broker publish failed: re-checks
    /// existence, creates/deletes the like row, and bumps both counters in
    /// one transaction so they never observe a torn state.
    async fn inline_db_fallback(
        &self,
        account_id: u64,
        video_id: u64,
        action: LikeAction,
        delta: i64,
    ) -> AppResult<()> {
        if !self
            .feed_repo
            .exists(video_id)
            .await
            .map_err(AppError::Internal)?
        {
            return Err(AppError::NotFound(format!("video {video_id} not found")));
        }

        let mut tx = self.like_repo.begin().await.map_err(AppError::Internal)?;

        match action {
            LikeAction::Like => {
                let created = sqlx::query(
                    r#"
                    INSERT INTO likes (video_id, account_id, created_at)
                    VALUES ($1, $2, now())
                    ON CONFLICT (video_id, account_id) DO NOTHING
                    "#,
                )
                .bind(video_id as i64)
                .bind(account_id as i64)
                .execute(&mut *tx)
                .await
                .map_err(AppError::Database)?
                .rows_affected()
                    > 0;

                if !created {
                    tx.rollback().await.map_err(AppError::Database)?;
                    return Err(AppError::Conflict("user has liked this video".to_string()));
                }
            }
            LikeAction::Unlike => {
                sqlx::query(r#"DELETE FROM likes WHERE video_id = $1 AND account_id = $2"#)
                    .bind(video_id as i64)
                    .bind(account_id as i64)
                    .execute(&mut *tx)
                    .await
                    .map_err(AppError::Database)?;
            }
        }

        sqlx::query(r#"UPDATE videos SET likes_count = GREATEST(likes_count + $1, 0) WHERE id = $2"#)
            .bind(delta)
            .bind(video_id as i64)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;
        sqlx::query(r#"UPDATE videos SET popularity = GREATEST(popularity + $1, 0) WHERE id = $2"#)
            .bind(delta)
            .bind(video_id as i64)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;
        Ok(())
    }
}
