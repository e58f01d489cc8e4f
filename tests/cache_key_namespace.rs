use feedpulse::services::popularity_cache::{bucket_key, snapshot_key};

#[test]
fn latest_cache_key_matches_documented_format() {
    let limit = 10;
    let before = 0;
    let key = format!("feed:listLatest:limit={limit}:before={before}");
    assert_eq!(key, "feed:listLatest:limit=10:before=0");
}

#[test]
fn following_cache_key_matches_documented_format() {
    let limit = 10;
    let account_id = 55u64;
    let before = 1234;
    let key = format!("feed:listByFollowing:limit={limit}:accountID={account_id}:before={before}");
    assert_eq!(key, "feed:listByFollowing:limit=10:accountID=55:before=1234");
}

#[test]
fn lock_key_wraps_any_cache_key() {
    let cache_key = "feed:listLatest:limit=10:before=0";
    let lock_key = format!("lock:{cache_key}");
    assert_eq!(lock_key, "lock:feed:listLatest:limit=10:before=0");
}

#[test]
fn bucket_and_snapshot_keys_share_the_minute_suffix() {
    let t = chrono::Utc::now();
    let bucket = bucket_key(t);
    let snapshot = snapshot_key(t);
    let bucket_suffix = bucket.rsplit(':').next().unwrap();
    let snapshot_suffix = snapshot.rsplit(':').next().unwrap();
    assert_eq!(bucket_suffix, snapshot_suffix);
    assert!(bucket.starts_with("hot:video:1m:"));
    assert!(snapshot.starts_with("hot:video:merge:1m:"));
}
