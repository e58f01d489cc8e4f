use std::time::Duration;

use chrono::Utc;

use crate::broker::events::{CommentAction, CommentEvent};
use crate::broker::{EventProducer, TOPIC_COMMENT_EVENTS, TOPIC_POPULARITY_EVENTS};
use crate::broker::events::PopularityEvent;
use crate::error::{AppError, AppResult};
use crate::models::{CommentRow, CommentView};
use crate::repository::{CommentRepository, FeedRepository};
use crate::services::popularity_cache::PopularityCache;

const PUBLISH_DEADLINE: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct CommentService {
    feed_repo: FeedRepository,
    comment_repo: CommentRepository,
    producer: EventProducer,
    popularity: PopularityCache,
}

impl CommentService {
    pub fn new(
        feed_repo: FeedRepository,
        comment_repo: CommentRepository,
        producer: EventProducer,
        popularity: PopularityCache,
    ) -> Self {
        CommentService {
            feed_repo,
            comment_repo,
            producer,
            popularity,
        }
    }

    pub async fn publish(
        &self,
        author_id: u64,
        author_username: &str,
        video_id: u64,
        content: &str,
    ) -> AppResult<CommentView> {
        if author_id == 0 {
            return Err(AppError::Unauthorized);
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("comment content must not be empty".to_string()));
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

        // The HTTP response must return the created comment with its id, so
        // creation happens synchronously here; `comment.publish` is then
        // published carrying that id, making the worker's own insert
        // (`ON CONFLICT (id) DO NOTHING`) an idempotent no-op in the common
        // case rather than the primary write-of-record the way `like.events`
        // is for the like worker.
        let row: CommentRow = self
            .comment_repo
            .create(video_id, author_id, author_username, content)
            .await
            .map_err(AppError::Internal)?;

        let event = CommentEvent {
            event_id: crate::broker::events::new_event_id(),
            action: CommentAction::Publish,
            comment_id: Some(row.id as u64),
            username: Some(author_username.to_string()),
            video_id: Some(video_id),
            author_id: Some(author_id),
            content: Some(content.to_string()),
            occurred_at,
        };
        let _ = self
            .producer
            .publish(TOPIC_COMMENT_EVENTS, "comment.publish", &event, PUBLISH_DEADLINE)
            .await;

        let popularity_event = PopularityEvent::update(video_id, 1, occurred_at);
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

        if !cache_enqueued {
            if let Err(err) = self.popularity.apply_delta(video_id, 1, occurred_at).await {
                tracing::warn!(error = %err, video_id, "inline cache fallback failed");
            }
        }

        Ok(row.into())
    }

    /// Deletes a comment; only the author may delete their own comment.
    /// Applies **no popularity delta** on either path — preserved asymmetry
    /// with like/unlike (SPEC_FULL.md §9).
    pub async fn delete(&self, author_id: u64, comment_id: u64) -> AppResult<()> {
        if author_id == 0 {
            return Err(AppError::Unauthorized);
        }
        let comment = self
            .comment_repo
            .get(comment_id)
            .await
            .map_err(AppError::Internal)?
            .ok_or_else(|| AppError::NotFound(format!("comment {comment_id} not found")))?;

        if comment.author_id as u64 != author_id {
            return Err(AppError::Permission("only the author may delete this comment".to_string()));
        }

        let occurred_at = Utc::now();
        let event = CommentEvent {
            event_id: crate::broker::events::new_event_id(),
            action: CommentAction::Delete,
            comment_id: Some(comment_id),
            username: None,
            video_id: Some(comment.video_id as u64),
            author_id: Some(author_id),
            content: None,
            occurred_at,
        };

        let mysql_enqueued = self
            .producer
            .publish(TOPIC_COMMENT_EVENTS, "comment.delete", &event, PUBLISH_DEADLINE)
            .await
            .is_ok();

        if !mysql_enqueued {
            self.comment_repo.delete(comment_id).await.map_err(AppError::Internal)?;
        }

        Ok(())
    }
}
