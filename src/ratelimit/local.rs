//! In-process per-key rate limiter.

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::trace;

use super::bucket::TokenBucket;

/// A thread-safe limiter that owns one [`TokenBucket`] per key.
///
/// Buckets are created lazily on first use. Creation is atomic with
/// respect to concurrent first calls for the same key: two racing callers
/// never end up with two buckets (which would double the effective
/// capacity for that key). Mutation of a bucket is serialized by its own
/// lock, so contention is scoped to a single key.
pub struct LocalRateLimiter {
    /// Per-key buckets, created on first reference.
    buckets: DashMap<String, Mutex<TokenBucket>>,
    /// Capacity applied to newly created buckets.
    capacity: u64,
    /// Refill rate (tokens per second) applied to newly created buckets.
    refill_rate_per_sec: f64,
}

impl LocalRateLimiter {
    /// Create a limiter. Buckets are not allocated until keys are seen.
    pub fn new(capacity: u64, refill_rate_per_sec: f64) -> Self {
        Self {
            buckets: DashMap::new(),
            capacity,
            refill_rate_per_sec,
        }
    }

    /// Refill and consume one token for `key`.
    ///
    /// Returns `true` if the request is admitted.
    pub fn allow(&self, key: &str) -> bool {
        // Fast path: bucket already exists.
        if let Some(bucket) = self.buckets.get(key) {
            return bucket.lock().try_consume();
        }

        trace!(key = %key, "creating bucket");

        // Miss: the entry API makes creation atomic under racing callers.
        let bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(TokenBucket::new(self.capacity, self.refill_rate_per_sec)));
        let allowed = bucket.lock().try_consume();
        allowed
    }

    /// Number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_bucket_created_on_first_use() {
        let limiter = LocalRateLimiter::new(10, 0.0);
        assert_eq!(limiter.bucket_count(), 0);

        assert!(limiter.allow("user-a"));
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn test_sequential_capacity_bound() {
        let limiter = LocalRateLimiter::new(10, 0.0);

        for _ in 0..10 {
            assert!(limiter.allow("user-a"));
        }
        assert!(!limiter.allow("user-a"));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = LocalRateLimiter::new(1, 0.0);

        assert!(limiter.allow("user-a"));
        assert!(!limiter.allow("user-a"));
        assert!(limiter.allow("user-b"));
    }

    #[test]
    fn test_concurrent_admissions_never_exceed_capacity() {
        let limiter = Arc::new(LocalRateLimiter::new(10, 0.0));
        let admitted = Arc::new(AtomicU64::new(0));

        let handles: Vec<_> = (0..15)
            .map(|_| {
                let limiter = limiter.clone();
                let admitted = admitted.clone();
                std::thread::spawn(move || {
                    if limiter.allow("hot-user") {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Exactly min(N, C): 15 callers, 10 tokens
        assert_eq!(admitted.load(Ordering::SeqCst), 10);
        // The racing first calls produced a single bucket
        assert_eq!(limiter.bucket_count(), 1);
    }
}
