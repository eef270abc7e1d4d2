//! Hot-key mitigation via local bucket sharding.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::trace;

use super::local::LocalRateLimiter;
use crate::metrics::Metrics;

/// Fast local pre-check that shields the coordination store from skewed
/// traffic.
///
/// One logical key is partitioned into `shard_count` independent local
/// buckets (`key#0` .. `key#N-1`). Each call lands on one shard, chosen by
/// combining the key hash with a rotating probe so a single hot key
/// exercises all shards rather than one hot lock. A request admitted here
/// never reaches the store; a request rejected here falls through to the
/// authoritative path.
///
/// The aggregate local capacity for one key is therefore bounded by
/// `shard_count x per-shard capacity`, not by the per-shard capacity. That
/// looser bound is the deliberate trade for spreading lock contention and
/// store load.
pub struct HotKeyLimiter {
    shards: LocalRateLimiter,
    shard_count: u32,
    /// Rotating probe mixed into shard selection.
    probe: AtomicU64,
    metrics: Arc<Metrics>,
}

impl HotKeyLimiter {
    /// Create a shard layer. A `shard_count` of zero is treated as one.
    pub fn new(
        shard_count: u32,
        capacity: u64,
        refill_rate_per_sec: f64,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            shards: LocalRateLimiter::new(capacity, refill_rate_per_sec),
            shard_count: shard_count.max(1),
            probe: AtomicU64::new(0),
            metrics,
        }
    }

    /// Try to admit `key` from the local shards.
    ///
    /// Every call counts as a local hit, admitted or not: this is a local
    /// decision point either way. An admission here is final and is
    /// recorded as such.
    pub fn allow(&self, key: &str) -> bool {
        self.metrics.record_local_hit();

        let shard = self.shard_index(key);
        let sharded_key = format!("{key}#{shard}");

        trace!(key = %key, shard = shard, "local shard check");

        let admitted = self.shards.allow(&sharded_key);
        if admitted {
            self.metrics.record_admitted();
        }
        admitted
    }

    /// Number of shards per logical key.
    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    fn shard_index(&self, key: &str) -> u32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let probe = self.probe.fetch_add(1, Ordering::Relaxed);
        (hasher.finish().wrapping_add(probe) % u64::from(self.shard_count)) as u32
    }
}
