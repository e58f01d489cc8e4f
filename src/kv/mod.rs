use std::time::Duration;

use redis::{aio::ConnectionManager, AsyncCommands, Script};

/// Distinguishes a cache miss from an I/O error; `get_bytes` callers must not
/// collapse the two, since a MISS is the expected steady-state outcome on the
/// single-flight path while an error should propagate as a soft-dependency
/// failure (see `AppError`/§7 of the port's error model).
#[derive(Debug)]
pub enum GetOutcome {
    Hit(Vec<u8>),
    Miss,
}

/// Release script for the token-owned lock: deletes the key only if its
/// current value matches the presented token. Plain GET-then-DEL would race
/// against another caller who reacquired the key after TTL expiry; EVAL makes
/// the check-then-delete atomic on the server.
const UNLOCK_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Thin typed surface over an ordered-set-capable KV store. Not a general
/// Redis client: only the operations the feed/popularity pipeline needs.
#[derive(Clone)]
pub struct KvStore {
    conn: ConnectionManager,
}

impl KvStore {
    pub fn new(conn: ConnectionManager) -> Self {
        KvStore { conn }
    }

    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(KvStore { conn })
    }

    pub async fn get_bytes(&self, key: &str, deadline: Duration) -> anyhow::Result<GetOutcome> {
        let mut conn = self.conn.clone();
        let fut = conn.get::<_, Option<Vec<u8>>>(key);
        match tokio::time::timeout(deadline, fut).await {
            Ok(Ok(Some(bytes))) => Ok(GetOutcome::Hit(bytes)),
            Ok(Ok(None)) => Ok(GetOutcome::Miss),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(anyhow::anyhow!("kv get_bytes timed out after {deadline:?}")),
        }
    }

    pub async fn set_bytes(&self, key: &str, value: &[u8], ttl: Duration) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    pub async fn expire(&self, key: &str, ttl: Duration) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.expire(key, ttl.as_secs() as i64).await?;
        Ok(())
    }

    pub async fn zincrby(&self, key: &str, delta: i64, member: &str) -> anyhow::Result<f64> {
        let mut conn = self.conn.clone();
        let score: f64 = conn.zincr(key, member, delta).await?;
        Ok(score)
    }

    /// Sums scores of `keys` into `dest`. Mirrors `ZUNIONSTORE dest numkeys
    /// keys... AGGREGATE SUM`, the only aggregate this pipeline uses.
    pub async fn zunionstore(&self, dest: &str, keys: &[String]) -> anyhow::Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("ZUNIONSTORE");
        cmd.arg(dest).arg(keys.len()).arg(keys).arg("AGGREGATE").arg("SUM");
        let _: i64 = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    /// Descending range `[start, stop]` by score; ties broken lexicographically
    /// by member, matching the underlying store's natural ZREVRANGE order.
    pub async fn zrevrange(&self, key: &str, start: isize, stop: isize) -> anyhow::Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.zrevrange(key, start, stop).await?;
        Ok(members)
    }

    /// Acquires `key` with a caller-minted random token, returning
    /// `(token, true)` on success or `(String::new(), false)` if already held.
    pub async fn lock(&self, key: &str, ttl: Duration) -> anyhow::Result<(String, bool)> {
        let token = mint_token();
        let mut conn = self.conn.clone();
        let acquired: bool = redis::cmd("SET")
            .arg(key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async::<_, Option<String>>(&mut conn)
            .await?
            .is_some();
        Ok((token, acquired))
    }

    /// Token-checked release: only deletes `key` if its value equals `token`.
    pub async fn unlock(&self, key: &str, token: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        let script = Script::new(UNLOCK_SCRIPT);
        let deleted: i64 = script.key(key).arg(token).invoke_async(&mut conn).await?;
        Ok(deleted == 1)
    }
}

fn mint_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_token_is_32_hex_chars() {
        let token = mint_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn mint_token_is_not_constant() {
        let a = mint_token();
        let b = mint_token();
        assert_ne!(a, b);
    }
}
