//! Distributed hierarchical rate limiter.
//!
//! The authoritative decision path: every call evaluates and updates all
//! of its keys as one atomic unit in the coordination store. A store that
//! cannot be reached never surfaces as an error; the configured
//! [`FailMode`] decides the outcome instead.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use super::fail_mode::FailMode;
use super::limiter::RateLimiter;
use super::store::CoordinationStore;
use crate::metrics::Metrics;

/// Outcome of one store evaluation, before the failure mode collapses it
/// to a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemoteOutcome {
    Admitted,
    Rejected,
    Unavailable,
}

/// Rate limiter coordinated through a shared store.
///
/// Holds no bucket state of its own: per-key tokens, timestamps, and
/// config all live in the store and are read fresh on every call, so an
/// operator's config change applies to the next evaluation.
pub struct DistributedRateLimiter {
    store: Arc<dyn CoordinationStore>,
    fail_mode: FailMode,
    metrics: Arc<Metrics>,
}

impl DistributedRateLimiter {
    /// Create a limiter over `store` with the given failure mode.
    pub fn new(store: Arc<dyn CoordinationStore>, fail_mode: FailMode, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            fail_mode,
            metrics,
        }
    }

    /// The configured failure mode.
    pub fn fail_mode(&self) -> FailMode {
        self.fail_mode
    }

    async fn evaluate(&self, keys: &[String]) -> RemoteOutcome {
        let now_ms = super::now_millis();
        let started = Instant::now();

        match self.store.evaluate(keys, now_ms).await {
            Ok(admitted) => {
                self.metrics.record_remote_latency(started.elapsed());
                self.metrics.record_remote_hit();
                if admitted {
                    RemoteOutcome::Admitted
                } else {
                    RemoteOutcome::Rejected
                }
            }
            Err(e) => {
                warn!(error = %e, "store evaluation failed");
                RemoteOutcome::Unavailable
            }
        }
    }
}

#[async_trait]
impl RateLimiter for DistributedRateLimiter {
    async fn allow(&self, keys: &[String]) -> bool {
        // No keys, nothing to violate.
        if keys.is_empty() {
            return true;
        }

        self.metrics.record_keys(keys);

        trace!(keys = ?keys, "distributed check");

        match self.evaluate(keys).await {
            RemoteOutcome::Admitted => {
                self.metrics.record_admitted();
                true
            }
            RemoteOutcome::Rejected => {
                debug!(keys = ?keys, "rate limit exceeded");
                self.metrics.record_rejected();
                false
            }
            RemoteOutcome::Unavailable => {
                self.metrics.record_remote_failure();
                match self.fail_mode {
                    FailMode::Open => {
                        self.metrics.record_admitted();
                        true
                    }
                    FailMode::Closed => {
                        self.metrics.record_rejected();
                        false
                    }
                }
            }
        }
    }
}
