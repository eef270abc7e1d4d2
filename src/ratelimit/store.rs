//! Coordination store boundary and its Redis implementation.
//!
//! All distributed bucket state lives in the store and is only ever
//! mutated through the single atomic script below. No other code path may
//! read-modify-write a bucket record: that is what keeps two concurrent
//! callers from both consuming the last token.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use thiserror::Error;

/// How long idle bucket records survive in the store.
pub const BUCKET_TTL_MS: u64 = 60_000;

/// Atomic evaluation of an ordered key list.
///
/// For each key: read its `<key>:config` hash (falling back to the
/// defaults given as arguments), read its bucket hash (a missing bucket is
/// full), refill by elapsed time (clamped at zero), and check for a whole
/// token. The first key below one token rejects the call and leaves every
/// key's token state untouched; a rejection still refreshes the expiry of
/// existing records. On admission every key is decremented by one and its
/// expiry reset. A config field that is missing or does not parse as a
/// number falls back to the defaults.
///
/// Config is re-read on every call, so an operator change to
/// `<key>:config` takes effect on the very next evaluation.
const ADMIT_SCRIPT: &str = r#"
local now = tonumber(ARGV[1])
local default_capacity = tonumber(ARGV[2])
local default_refill_rate = tonumber(ARGV[3])
local ttl_ms = tonumber(ARGV[4])
local allowed = 1
local refilled = {}
for i, key in ipairs(KEYS) do
    local config_key = key .. ":config"
    local capacity = tonumber(redis.call("HGET", config_key, "capacity")) or default_capacity
    local refill_rate = tonumber(redis.call("HGET", config_key, "refill_rate")) or default_refill_rate
    local refill_rate_per_ms = refill_rate / 1000.0
    local tokens = tonumber(redis.call("HGET", key, "tokens")) or capacity
    local last_refill = tonumber(redis.call("HGET", key, "last_refill")) or now
    local elapsed = math.max(0, now - last_refill)
    tokens = math.min(capacity, tokens + elapsed * refill_rate_per_ms)
    if tokens < 1 then
        allowed = 0
        break
    end
    refilled[i] = tokens
end
if allowed == 1 then
    for i, key in ipairs(KEYS) do
        redis.call("HSET", key, "tokens", refilled[i] - 1, "last_refill", now)
        redis.call("PEXPIRE", key, ttl_ms)
    end
else
    for i, key in ipairs(KEYS) do
        redis.call("PEXPIRE", key, ttl_ms)
    end
end
return allowed
"#;

/// Errors at the store boundary. These never reach `allow()` callers; the
/// distributed limiter converts them through its failure mode.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store transport error: {0}")]
    Transport(#[from] redis::RedisError),
    #[error("store call exceeded {0:?}")]
    Timeout(Duration),
}

/// Default bucket parameters applied when a key has no config record.
#[derive(Debug, Clone, Copy)]
pub struct BucketDefaults {
    /// Tokens a bucket holds when no `<key>:config` record exists.
    pub capacity: u64,
    /// Refill rate in tokens per second when no `<key>:config` record exists.
    pub refill_rate_per_sec: f64,
}

/// A store that can evaluate and update many keys as one atomic unit.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Run the admit script over `keys` at time `now_ms`.
    ///
    /// Returns `Ok(true)` if every key had a token, `Ok(false)` if any key
    /// was exhausted, `Err` if the store could not be reached in time.
    async fn evaluate(&self, keys: &[String], now_ms: u64) -> Result<bool, StoreError>;
}

/// Redis-backed [`CoordinationStore`] executing [`ADMIT_SCRIPT`] via
/// EVALSHA (loaded on first use, reloaded transparently after a store
/// restart).
pub struct RedisStore {
    conn: ConnectionManager,
    script: Script,
    defaults: BucketDefaults,
    command_timeout: Duration,
}

impl RedisStore {
    /// Wrap an established connection manager.
    pub fn new(conn: ConnectionManager, defaults: BucketDefaults, command_timeout: Duration) -> Self {
        Self {
            conn,
            script: Script::new(ADMIT_SCRIPT),
            defaults,
            command_timeout,
        }
    }

    /// Connect to `url` and wrap the resulting connection manager.
    ///
    /// The manager reconnects on its own after transient failures; only a
    /// store that is down at construction time surfaces here.
    pub async fn connect(
        url: &str,
        defaults: BucketDefaults,
        command_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self::new(conn, defaults, command_timeout))
    }
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn evaluate(&self, keys: &[String], now_ms: u64) -> Result<bool, StoreError> {
        let mut invocation = self.script.prepare_invoke();
        for key in keys {
            invocation.key(key.as_str());
        }
        invocation
            .arg(now_ms)
            .arg(self.defaults.capacity)
            .arg(self.defaults.refill_rate_per_sec)
            .arg(BUCKET_TTL_MS);

        let mut conn = self.conn.clone();
        let call = invocation.invoke_async::<i64>(&mut conn);

        match tokio::time::timeout(self.command_timeout, call).await {
            Ok(Ok(admitted)) => Ok(admitted == 1),
            Ok(Err(e)) => Err(StoreError::Transport(e)),
            Err(_) => Err(StoreError::Timeout(self.command_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_updates_state_only_on_admission() {
        // The decrement and timestamp write are confined to the admitted
        // branch; the rejected branch only touches expiry.
        let (admit_branch, reject_branch) = ADMIT_SCRIPT
            .split_once("if allowed == 1 then")
            .map(|(_, rest)| rest.split_once("else").unwrap())
            .unwrap();
        assert!(admit_branch.contains("HSET"));
        assert!(!reject_branch.contains("HSET"));
        assert!(reject_branch.contains("PEXPIRE"));
    }

    #[test]
    fn test_script_reads_config_per_call() {
        assert!(ADMIT_SCRIPT.contains(r#"key .. ":config""#));
        // Defaults come from arguments, never constants in the script body
        assert!(ADMIT_SCRIPT.contains("default_capacity = tonumber(ARGV[2])"));
        assert!(ADMIT_SCRIPT.contains("default_refill_rate = tonumber(ARGV[3])"));
    }

    #[test]
    fn test_script_clamps_negative_elapsed() {
        assert!(ADMIT_SCRIPT.contains("math.max(0, now - last_refill)"));
    }
}
