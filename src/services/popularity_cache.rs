use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};

use crate::kv::KvStore;

/// Number of one-minute buckets merged into a single popularity snapshot.
pub const WINDOW_MINUTES: i64 = 60;

/// TTL applied to a bucket on every write; comfortably longer than the
/// 60-minute merge window plus the snapshot's own grace period.
pub const BUCKET_TTL: Duration = Duration::from_secs(90 * 60);

/// TTL of a merge snapshot: long enough to serve one viewer's multi-page
/// traversal at a fixed `as_of`, short enough to pick up fresh deltas soon
/// after.
pub const SNAPSHOT_TTL: Duration = Duration::from_secs(2 * 60);

/// Truncates `instant` down to the containing UTC minute.
pub fn truncate_to_minute(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(instant)
}

/// Formats a bucket key for the UTC minute `instant` truncates to:
/// `hot:video:1m:<YYYYMMDDHHMM>`.
pub fn bucket_key(instant: DateTime<Utc>) -> String {
    format!("hot:video:1m:{}", truncate_to_minute(instant).format("%Y%m%d%H%M"))
}

/// Formats the merge snapshot key for a given `as_of` minute:
/// `hot:video:merge:1m:<YYYYMMDDHHMM>`.
pub fn snapshot_key(as_of: DateTime<Utc>) -> String {
    format!(
        "hot:video:merge:1m:{}",
        truncate_to_minute(as_of).format("%Y%m%d%H%M")
    )
}

/// Builds the 60 bucket keys covering `[as_of - 59m, as_of]`.
pub fn bucket_keys_for_window(as_of: DateTime<Utc>) -> Vec<String> {
    let as_of = truncate_to_minute(as_of);
    (0..WINDOW_MINUTES)
        .rev()
        .map(|offset| bucket_key(as_of - chrono::Duration::minutes(offset)))
        .collect()
}

#[derive(Clone)]
pub struct PopularityCache {
    kv: KvStore,
}

impl PopularityCache {
    pub fn new(kv: KvStore) -> Self {
        PopularityCache { kv }
    }

    /// Applies `delta` to the bucket containing `occurred_at`, refreshing its
    /// TTL. Used both by the popularity worker and by the inline cache
    /// fallback of the like/comment services.
    pub async fn apply_delta(
        &self,
        video_id: u64,
        delta: i64,
        occurred_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let key = bucket_key(occurred_at);
        self.kv.zincrby(&key, delta, &video_id.to_string()).await?;
        self.kv.expire(&key, BUCKET_TTL).await?;
        Ok(())
    }

    /// Ensures the merge snapshot for `as_of` exists, building it from the 60
    /// underlying buckets if not. Idempotent: a second caller racing within
    /// the snapshot's lifetime is a harmless no-op `ZUNIONSTORE` rerun.
    pub async fn ensure_snapshot(&self, as_of: DateTime<Utc>) -> anyhow::Result<String> {
        let snapshot = snapshot_key(as_of);
        if !self.kv.exists(&snapshot).await? {
            let keys = bucket_keys_for_window(as_of);
            self.kv.zunionstore(&snapshot, &keys).await?;
            self.kv.expire(&snapshot, SNAPSHOT_TTL).await?;
        }
        Ok(snapshot)
    }

    /// Reads `[offset, offset+limit-1]` of the snapshot, parsing members back
    /// into video ids and skipping any that don't parse.
    pub async fn read_page(
        &self,
        snapshot: &str,
        offset: i64,
        limit: i64,
    ) -> anyhow::Result<Vec<u64>> {
        let stop = offset + limit - 1;
        let members = self.kv.zrevrange(snapshot, offset as isize, stop as isize).await?;
        Ok(members.into_iter().filter_map(|m| m.parse().ok()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bucket_key_formats_utc_minute() {
        let t = Utc.with_ymd_and_hms(2026, 8, 1, 14, 37, 52).unwrap();
        assert_eq!(bucket_key(t), "hot:video:1m:202608011437");
    }

    #[test]
    fn bucket_key_ignores_seconds() {
        let a = Utc.with_ymd_and_hms(2026, 8, 1, 14, 37, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 8, 1, 14, 37, 59).unwrap();
        assert_eq!(bucket_key(a), bucket_key(b));
    }

    #[test]
    fn snapshot_key_has_merge_prefix() {
        let t = Utc.with_ymd_and_hms(2026, 8, 1, 14, 37, 0).unwrap();
        assert_eq!(snapshot_key(t), "hot:video:merge:1m:202608011437");
    }

    #[test]
    fn bucket_keys_for_window_covers_sixty_minutes_ending_at_as_of() {
        let as_of = Utc.with_ymd_and_hms(2026, 8, 1, 15, 0, 0).unwrap();
        let keys = bucket_keys_for_window(as_of);
        assert_eq!(keys.len(), 60);
        assert_eq!(keys.last().unwrap(), &bucket_key(as_of));
        let earliest = as_of - chrono::Duration::minutes(59);
        assert_eq!(keys.first().unwrap(), &bucket_key(earliest));
    }

    #[test]
    fn bucket_keys_for_window_are_strictly_increasing() {
        let as_of = Utc.with_ymd_and_hms(2026, 8, 1, 15, 0, 0).unwrap();
        let keys = bucket_keys_for_window(as_of);
        for pair in keys.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }
}
