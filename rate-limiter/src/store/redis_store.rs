use super::BucketStore;
use crate::{Acquisition, BucketLimits, RateLimitError, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use std::time::Duration;
use tracing::debug;

/// Key prefix for bucket hashes
pub const KEY_PREFIX: &str = "rl";

/// Read-refill-compare-write executed server side, so concurrent callers in
/// any process see a single total order per bucket.
///
/// KEYS[1] = bucket hash, ARGV = capacity, refill rate, cost, now, ttl seconds.
/// Returns `{allowed, tokens}` with tokens as a string to keep the fraction.
const TOKEN_BUCKET_LUA: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local rate = tonumber(ARGV[2])
local cost = tonumber(ARGV[3])
local now = tonumber(ARGV[4])
local ttl = tonumber(ARGV[5])

local state = redis.call('HMGET', key, 'tokens', 'ts')
local tokens = tonumber(state[1])
local last = tonumber(state[2])
if tokens == nil or last == nil then
  tokens = capacity
  last = now
end

local elapsed = math.max(0, now - last)
tokens = math.min(capacity, tokens + elapsed * rate)
if now > last then
  last = now
end

local allowed = 0
if tokens >= cost then
  tokens = tokens - cost
  allowed = 1
end

redis.call('HSET', key, 'tokens', tostring(tokens), 'ts', tostring(last))
if ttl > 0 then
  redis.call('EXPIRE', key, ttl)
end
return {allowed, tostring(tokens)}
"#;

/// Redis-backed bucket store shared across processes.
///
/// Idle buckets expire through a key TTL refreshed on every acquisition.
#[derive(Clone)]
pub struct RedisBucketStore {
    redis: ConnectionManager,
    script: Script,
    idle_ttl: Duration,
}

impl RedisBucketStore {
    /// Wrap an existing connection manager
    pub fn new(redis: ConnectionManager, idle_ttl: Duration) -> Self {
        Self {
            redis,
            script: Script::new(TOKEN_BUCKET_LUA),
            idle_ttl,
        }
    }

    /// Connect to `url`
    pub async fn connect(url: &str, idle_ttl: Duration) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self::new(manager, idle_ttl))
    }

    /// Hash key holding the bucket for `key`
    pub fn bucket_key(key: &str) -> String {
        format!("{}:{}", KEY_PREFIX, key)
    }
}

#[async_trait]
impl BucketStore for RedisBucketStore {
    async fn acquire(
        &self,
        key: &str,
        limits: BucketLimits,
        cost: f64,
        now: f64,
    ) -> Result<Acquisition> {
        let mut conn = self.redis.clone();
        let (allowed, tokens): (i64, String) = self
            .script
            .key(Self::bucket_key(key))
            .arg(limits.capacity)
            .arg(limits.refill_rate)
            .arg(cost)
            .arg(now)
            .arg(self.idle_ttl.as_secs())
            .invoke_async(&mut conn)
            .await?;

        let remaining: f64 = tokens.parse().map_err(|e| {
            RateLimitError::Store(format!("unparseable token count {:?}: {}", tokens, e))
        })?;

        debug!("Bucket {} -> allowed={} remaining={:.3}", key, allowed, remaining);
        Ok(Acquisition::from_remaining(allowed == 1, remaining, cost, &limits))
    }
}
