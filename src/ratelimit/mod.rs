//! Rate limiting engine: local buckets, hot-key sharding, and the
//! store-coordinated distributed path.

mod bucket;
mod distributed;
mod fail_mode;
mod hotkey;
mod limiter;
mod local;
mod store;

pub use bucket::TokenBucket;
pub use distributed::DistributedRateLimiter;
pub use fail_mode::FailMode;
pub use hotkey::HotKeyLimiter;
pub use limiter::RateLimiter;
pub use local::LocalRateLimiter;
pub use store::{BucketDefaults, CoordinationStore, RedisStore, StoreError, BUCKET_TTL_MS};

/// Current wall clock in epoch milliseconds.
pub(crate) fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}
