use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row shape of the `videos` table. `likes_count` and `popularity` are
/// denormalised and mutated only by the like/comment services or their
/// workers, never decremented below zero.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VideoRow {
    pub id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub title: String,
    pub description: String,
    pub play_url: String,
    pub cover_url: String,
    pub create_time: DateTime<Utc>,
    pub likes_count: i64,
    pub popularity: i64,
}

/// One item embedded in a feed response. Distinct from `VideoRow` because it
/// carries `is_liked`, which is viewer-scoped and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedVideo {
    pub id: u64,
    pub author_id: u64,
    pub author_username: String,
    pub title: String,
    pub description: String,
    pub play_url: String,
    pub cover_url: String,
    pub create_time: i64,
    pub likes_count: i64,
    pub is_liked: bool,
}

impl FeedVideo {
    pub fn from_row(row: &VideoRow, is_liked: bool) -> Self {
        FeedVideo {
            id: row.id as u64,
            author_id: row.author_id as u64,
            author_username: row.author_username.clone(),
            title: row.title.clone(),
            description: row.description.clone(),
            play_url: row.play_url.clone(),
            cover_url: row.cover_url.clone(),
            create_time: row.create_time.timestamp(),
            likes_count: row.likes_count,
            is_liked,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub video_id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: u64,
    pub video_id: u64,
    pub author_id: u64,
    pub author_username: String,
    pub content: String,
    pub created_at: i64,
}

impl From<CommentRow> for CommentView {
    fn from(row: CommentRow) -> Self {
        CommentView {
            id: row.id as u64,
            video_id: row.video_id as u64,
            author_id: row.author_id as u64,
            author_username: row.author_username,
            content: row.content,
            created_at: row.created_at.timestamp(),
        }
    }
}

// ---- /feed/latest ----

#[derive(Debug, Deserialize)]
pub struct LatestFeedRequest {
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub latest_time: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LatestFeedResponse {
    pub video_list: Vec<FeedVideo>,
    pub next_time: i64,
    pub has_more: bool,
}

// ---- /feed/likesCount ----

#[derive(Debug, Deserialize)]
pub struct LikesCountFeedRequest {
    #[serde(default)]
    pub limit: i64,
    pub likes_count_before: Option<i64>,
    pub id_before: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct LikesCountFeedResponse {
    pub video_list: Vec<FeedVideo>,
    pub next_likes_count_before: Option<i64>,
    pub next_id_before: Option<u64>,
    pub has_more: bool,
}

// ---- /feed/following ----

#[derive(Debug, Deserialize)]
pub struct FollowingFeedRequest {
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub latest_time: i64,
}

pub type FollowingFeedResponse = LatestFeedResponse;

// ---- /feed/popularity ----

#[derive(Debug, Deserialize)]
pub struct PopularityFeedRequest {
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub as_of: i64,
    #[serde(default)]
    pub offset: i64,
    pub latest_popularity: Option<i64>,
    pub latest_before: Option<i64>,
    pub latest_id_before: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct PopularityFeedResponse {
    pub video_list: Vec<FeedVideo>,
    pub as_of: i64,
    pub next_offset: i64,
    pub has_more: bool,
    pub next_latest_popularity: Option<i64>,
    pub next_latest_before: Option<i64>,
    pub next_latest_id_before: Option<u64>,
}

// ---- /like, /unlike, /comment, /comment/delete ----

#[derive(Debug, Deserialize)]
pub struct LikeRequest {
    pub video_id: u64,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct PublishCommentRequest {
    pub video_id: u64,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteCommentRequest {
    pub comment_id: u64,
}

/// Cursor for the likes-count feed, valid only when both components are
/// present together.
#[derive(Debug, Clone, Copy)]
pub struct LikesCountCursor {
    pub likes_count: i64,
    pub id: u64,
}

/// Cursor for the popularity feed's DB fallback path.
#[derive(Debug, Clone, Copy)]
pub struct PopularityCursor {
    pub popularity: i64,
    pub before: i64,
    pub id: u64,
}
