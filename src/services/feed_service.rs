use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{AppError, AppResult};
use crate::kv::{GetOutcome, KvStore};
use crate::models::*;
use crate::repository::{FeedRepository, LikeRepository};
use crate::services::popularity_cache::PopularityCache;

const CACHE_GET_DEADLINE: Duration = Duration::from_millis(50);
const MERGE_DEADLINE: Duration = Duration::from_millis(80);
const RESPONSE_TTL: Duration = Duration::from_secs(5);
const LOCK_TTL: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(20);
const POLL_ATTEMPTS: usize = 5;

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 50;

/// Clamps an out-of-range `limit` to the default, matching the source
/// system's "outside [1,50] -> 10" rule rather than clamping to the nearest
/// bound.
fn sanitize_limit(limit: i64) -> i64 {
    if (1..=MAX_LIMIT).contains(&limit) {
        limit
    } else {
        DEFAULT_LIMIT
    }
}

#[derive(Clone)]
pub struct FeedService {
    repo: FeedRepository,
    like_repo: LikeRepository,
    cache: KvStore,
    popularity: PopularityCache,
}

impl FeedService {
    pub fn new(
        repo: FeedRepository,
        like_repo: LikeRepository,
        cache: KvStore,
        popularity: PopularityCache,
    ) -> Self {
        FeedService {
            repo,
            like_repo,
            cache,
            popularity,
        }
    }

    /// Batched liked-lookup plus item assembly. For `viewer_id == 0` or an
    /// empty row set, `batch_get_liked` itself short-circuits without a DB
    /// round-trip.
    async fn build_feed_items(&self, viewer_id: u64, rows: &[VideoRow]) -> anyhow::Result<Vec<FeedVideo>> {
        let ids: Vec<u64> = rows.iter().map(|r| r.id as u64).collect();
        let liked = self.like_repo.batch_get_liked(viewer_id, &ids).await?;
        Ok(rows
            .iter()
            .map(|row| {
                let is_liked = liked.get(&(row.id as u64)).copied().unwrap_or(false);
                FeedVideo::from_row(row, is_liked)
            })
            .collect())
    }

    /// Single-flight cache-or-compute: collapses concurrent misses on
    /// `cache_key` into one `compute` call. The lock loser either observes
    /// the winner's write within its poll window or falls through to
    /// `compute` itself without writing back (the holder already will).
    async fn get_or_compute<T, F, Fut>(&self, cache_key: &str, compute: F) -> anyhow::Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        if let Some(hit) = self.try_cache_hit(cache_key).await {
            return Ok(hit);
        }

        let lock_key = format!("lock:{cache_key}");
        let (token, acquired) = match self.cache.lock(&lock_key, LOCK_TTL).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(error = %err, cache_key, "lock acquisition failed, falling back to DB");
                return compute().await;
            }
        };

        if acquired {
            if let Some(hit) = self.try_cache_hit(cache_key).await {
                let _ = self.cache.unlock(&lock_key, &token).await;
                return Ok(hit);
            }
            let result = compute().await?;
            if let Ok(body) = serde_json::to_vec(&result) {
                if let Err(err) = self.cache.set_bytes(cache_key, &body, RESPONSE_TTL).await {
                    tracing::warn!(error = %err, cache_key, "cache write failed");
                }
            }
            let _ = self.cache.unlock(&lock_key, &token).await;
            Ok(result)
        } else {
            for _ in 0..POLL_ATTEMPTS {
                tokio::time::sleep(POLL_INTERVAL).await;
                if let Some(hit) = self.try_cache_hit(cache_key).await {
                    return Ok(hit);
                }
            }
            compute().await
        }
    }

    async fn try_cache_hit<T: DeserializeOwned>(&self, cache_key: &str) -> Option<T> {
        match self.cache.get_bytes(cache_key, CACHE_GET_DEADLINE).await {
            Ok(GetOutcome::Hit(bytes)) => serde_json::from_slice(&bytes).ok(),
            Ok(GetOutcome::Miss) => None,
            Err(err) => {
                tracing::warn!(error = %err, cache_key, "cache read failed, treating as miss");
                None
            }
        }
    }

    pub async fn list_latest(
        &self,
        viewer_id: u64,
        req: LatestFeedRequest,
    ) -> AppResult<LatestFeedResponse> {
        let limit = sanitize_limit(req.limit);
        let before = if req.latest_time > 0 {
            Some(
                Utc.timestamp_opt(req.latest_time, 0)
                    .single()
                    .ok_or_else(|| AppError::Validation("invalid latest_time".to_string()))?,
            )
        } else {
            None
        };

        let compute = || async {
            let rows = self.repo.list_latest(limit, before).await?;
            let next_time = rows.last().map(|r| r.create_time.timestamp()).unwrap_or(0);
            let has_more = crate::repository::feed_repo::has_more(rows.len(), limit);
            let video_list = self.build_feed_items(viewer_id, &rows).await?;
            Ok(LatestFeedResponse {
                video_list,
                next_time,
                has_more,
            })
        };

        // Only cache the anonymous view: per-viewer `is_liked` would otherwise
        // leak into a response served to a different viewer.
        if viewer_id == 0 {
            let cache_key = format!("feed:listLatest:limit={limit}:before={}", req.latest_time.max(0));
            self.get_or_compute(&cache_key, compute).await.map_err(AppError::Internal)
        } else {
            compute().await.map_err(AppError::Internal)
        }
    }

    pub async fn list_by_likes_count(
        &self,
        viewer_id: u64,
        req: LikesCountFeedRequest,
    ) -> AppResult<LikesCountFeedResponse> {
        let limit = sanitize_limit(req.limit);
        let cursor = validate_likes_count_cursor(req.likes_count_before, req.id_before)?;

        let rows = self
            .repo
            .list_by_likes_count(limit, cursor.map(|c| (c.likes_count, c.id)))
            .await
            .map_err(AppError::Internal)?;
        let has_more = crate::repository::feed_repo::has_more(rows.len(), limit);
        let (next_likes_count_before, next_id_before) = match rows.last() {
            Some(row) => (Some(row.likes_count), Some(row.id as u64)),
            None => (None, None),
        };
        let video_list = self
            .build_feed_items(viewer_id, &rows)
            .await
            .map_err(AppError::Internal)?;

        Ok(LikesCountFeedResponse {
            video_list,
            next_likes_count_before,
            next_id_before,
            has_more,
        })
    }

    pub async fn list_following(
        &self,
        viewer_id: u64,
        req: FollowingFeedRequest,
    ) -> AppResult<FollowingFeedResponse> {
        // Following silently returns empty for an anonymous viewer rather
        // than erroring; there is nothing to follow with viewer_id == 0.
        if viewer_id == 0 {
            return Ok(LatestFeedResponse {
                video_list: Vec::new(),
                next_time: 0,
                has_more: false,
            });
        }

        let limit = sanitize_limit(req.limit);
        let before = if req.latest_time > 0 {
            Some(
                Utc.timestamp_opt(req.latest_time, 0)
                    .single()
                    .ok_or_else(|| AppError::Validation("invalid latest_time".to_string()))?,
            )
        } else {
            None
        };

        let compute = || async {
            let rows = self.repo.list_by_following(viewer_id, limit, before).await?;
            let next_time = rows.last().map(|r| r.create_time.timestamp()).unwrap_or(0);
            let has_more = crate::repository::feed_repo::has_more(rows.len(), limit);
            let video_list = self.build_feed_items(viewer_id, &rows).await?;
            Ok(LatestFeedResponse {
                video_list,
                next_time,
                has_more,
            })
        };

        let cache_key = format!(
            "feed:listByFollowing:limit={limit}:accountID={viewer_id}:before={}",
            req.latest_time.max(0)
        );
        self.get_or_compute(&cache_key, compute).await.map_err(AppError::Internal)
    }

    pub async fn list_popularity(
        &self,
        viewer_id: u64,
        req: PopularityFeedRequest,
    ) -> AppResult<PopularityFeedResponse> {
        let limit = sanitize_limit(req.limit);
        if req.offset < 0 {
            return Err(AppError::Validation("offset must be non-negative".to_string()));
        }
        let fallback_cursor = validate_popularity_cursor(
            req.latest_popularity,
            req.latest_before,
            req.latest_id_before,
        )?;

        let as_of = if req.as_of > 0 {
            Utc.timestamp_opt(req.as_of, 0)
                .single()
                .ok_or_else(|| AppError::Validation("invalid as_of".to_string()))?
        } else {
            Utc::now()
        };
        let as_of = crate::services::popularity_cache::truncate_to_minute(as_of);

        let merge_result = self.try_popularity_merge(viewer_id, as_of, req.offset, limit).await;

        match merge_result {
            Ok(Some(response)) => return Ok(response),
            Ok(None) => {
                // Terminal empty page past the first: no DB fallback, just an
                // empty, non-continuable page.
                return Ok(PopularityFeedResponse {
                    video_list: Vec::new(),
                    as_of: as_of.timestamp(),
                    next_offset: req.offset,
                    has_more: false,
                    next_latest_popularity: None,
                    next_latest_before: None,
                    next_latest_id_before: None,
                });
            }
            Err(err) => {
                tracing::warn!(error = %err, "popularity cache path failed, falling back to DB");
            }
        }

        self.popularity_db_fallback(viewer_id, limit, fallback_cursor, as_of)
            .await
            .map_err(AppError::Internal)
    }

    /// Returns `Ok(Some(response))` on a usable cache page, `Ok(None)` for a
    /// terminal empty page at `offset > 0`, and `Err` to signal the caller
    /// should fall back to the DB path.
    async fn try_popularity_merge(
        &self,
        viewer_id: u64,
        as_of: DateTime<Utc>,
        offset: i64,
        limit: i64,
    ) -> anyhow::Result<Option<PopularityFeedResponse>> {
        let snapshot = tokio::time::timeout(MERGE_DEADLINE, self.popularity.ensure_snapshot(as_of))
            .await
            .map_err(|_| anyhow::anyhow!("popularity merge timed out"))??;

        let ids = tokio::time::timeout(MERGE_DEADLINE, self.popularity.read_page(&snapshot, offset, limit))
            .await
            .map_err(|_| anyhow::anyhow!("popularity read timed out"))??;

        if ids.is_empty() {
            if offset > 0 {
                return Ok(None);
            }
            return Err(anyhow::anyhow!("empty snapshot page at offset 0"));
        }

        let rows = self.repo.get_by_ids(&ids).await?;
        let by_id: std::collections::HashMap<u64, VideoRow> =
            rows.into_iter().map(|r| (r.id as u64, r)).collect();
        // preserve the snapshot's original order; ids not found are dropped.
        let ordered_rows: Vec<VideoRow> = ids.iter().filter_map(|id| by_id.get(id).cloned()).collect();

        let video_list = self.build_feed_items(viewer_id, &ordered_rows).await?;
        let has_more = crate::repository::feed_repo::has_more(video_list.len(), limit);

        Ok(Some(PopularityFeedResponse {
            next_offset: offset + video_list.len() as i64,
            video_list,
            as_of: as_of.timestamp(),
            has_more,
            next_latest_popularity: None,
            next_latest_before: None,
            next_latest_id_before: None,
        }))
    }

    async fn popularity_db_fallback(
        &self,
        viewer_id: u64,
        limit: i64,
        cursor: Option<PopularityCursor>,
        as_of: DateTime<Utc>,
    ) -> anyhow::Result<PopularityFeedResponse> {
        let cursor_tuple = match cursor {
            Some(c) => Some((
                c.popularity,
                Utc.timestamp_opt(c.before, 0)
                    .single()
                    .ok_or_else(|| anyhow::anyhow!("invalid latest_before"))?,
                c.id,
            )),
            None => None,
        };
        let rows = self.repo.list_by_popularity(limit, cursor_tuple).await?;
        let has_more = crate::repository::feed_repo::has_more(rows.len(), limit);
        let (next_latest_popularity, next_latest_before, next_latest_id_before) = match rows.last() {
            Some(row) => (
                Some(row.popularity),
                Some(row.create_time.timestamp()),
                Some(row.id as u64),
            ),
            None => (None, None, None),
        };
        let video_list = self.build_feed_items(viewer_id, &rows).await?;

        Ok(PopularityFeedResponse {
            video_list,
            as_of: as_of.timestamp(),
            next_offset: 0,
            has_more,
            next_latest_popularity,
            next_latest_before,
            next_latest_id_before,
        })
    }
}

fn validate_likes_count_cursor(
    likes_count_before: Option<i64>,
    id_before: Option<u64>,
) -> AppResult<Option<LikesCountCursor>> {
    match (likes_count_before, id_before) {
        (None, None) => Ok(None),
        (Some(likes_count), Some(id)) => {
            if id == 0 && likes_count != 0 {
                return Err(AppError::Validation(
                    "id_before == 0 with non-zero likes_count_before".to_string(),
                ));
            }
            Ok(Some(LikesCountCursor { likes_count, id }))
        }
        _ => Err(AppError::Validation(
            "likes_count_before and id_before must be provided together".to_string(),
        )),
    }
}

fn validate_popularity_cursor(
    latest_popularity: Option<i64>,
    latest_before: Option<i64>,
    latest_id_before: Option<u64>,
) -> AppResult<Option<PopularityCursor>> {
    match (latest_popularity, latest_before, latest_id_before) {
        (None, None, None) => Ok(None),
        (Some(popularity), Some(before), Some(id)) => {
            if popularity < 0 {
                return Err(AppError::Validation("latest_popularity must be non-negative".to_string()));
            }
            Ok(Some(PopularityCursor {
                popularity,
                before,
                id,
            }))
        }
        _ => Err(AppError::Validation(
            "latest_popularity, latest_before, and latest_id_before must be provided together".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_limit_keeps_in_range_values() {
        assert_eq!(sanitize_limit(1), 1);
        assert_eq!(sanitize_limit(50), 50);
        assert_eq!(sanitize_limit(25), 25);
    }

    #[test]
    fn sanitize_limit_defaults_out_of_range_values() {
        assert_eq!(sanitize_limit(0), DEFAULT_LIMIT);
        assert_eq!(sanitize_limit(-5), DEFAULT_LIMIT);
        assert_eq!(sanitize_limit(51), DEFAULT_LIMIT);
    }

    #[test]
    fn likes_count_cursor_requires_both_or_neither() {
        assert!(validate_likes_count_cursor(None, None).unwrap().is_none());
        assert!(validate_likes_count_cursor(Some(5), None).is_err());
        assert!(validate_likes_count_cursor(None, Some(1)).is_err());
        assert!(validate_likes_count_cursor(Some(5), Some(1)).unwrap().is_some());
    }

    #[test]
    fn likes_count_cursor_rejects_zero_id_with_nonzero_count() {
        assert!(validate_likes_count_cursor(Some(5), Some(0)).is_err());
        assert!(validate_likes_count_cursor(Some(0), Some(0)).unwrap().is_some());
    }

    #[test]
    fn popularity_cursor_requires_all_three_together() {
        assert!(validate_popularity_cursor(None, None, None).unwrap().is_none());
        assert!(validate_popularity_cursor(Some(1), None, None).is_err());
        assert!(validate_popularity_cursor(Some(1), Some(2), Some(3)).unwrap().is_some());
    }

    #[test]
    fn popularity_cursor_rejects_negative_popularity() {
        assert!(validate_popularity_cursor(Some(-1), Some(2), Some(3)).is_err());
    }
}
