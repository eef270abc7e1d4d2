//! Token bucket primitive.

/// A single token bucket: a capacity, a fractional token count, and the
/// timestamp of the last refill.
///
/// The bucket itself is not synchronized. Callers that share a bucket
/// across threads wrap it in a lock; see [`LocalRateLimiter`](super::LocalRateLimiter).
#[derive(Debug)]
pub struct TokenBucket {
    /// Maximum tokens the bucket can hold.
    capacity: f64,
    /// Tokens added per elapsed millisecond.
    refill_rate_per_ms: f64,
    /// Current token count. Fractional so that a 1 ms tick still accumulates.
    tokens: f64,
    /// Wall-clock milliseconds of the last refill.
    last_refill_ms: u64,
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// `refill_rate_per_sec` is converted to a per-millisecond rate so the
    /// refill arithmetic works on millisecond timestamps.
    pub fn new(capacity: u64, refill_rate_per_sec: f64) -> Self {
        Self::new_at(capacity, refill_rate_per_sec, super::now_millis())
    }

    pub(crate) fn new_at(capacity: u64, refill_rate_per_sec: f64, now_ms: u64) -> Self {
        Self {
            capacity: capacity as f64,
            refill_rate_per_ms: refill_rate_per_sec / 1000.0,
            tokens: capacity as f64,
            last_refill_ms: now_ms,
        }
    }

    /// Refill based on elapsed time, then try to consume a single token.
    ///
    /// Returns `true` if a token was consumed, `false` if the bucket is empty.
    pub fn try_consume(&mut self) -> bool {
        self.try_consume_at(super::now_millis())
    }

    /// Same as [`try_consume`](Self::try_consume) with an explicit clock reading.
    pub(crate) fn try_consume_at(&mut self, now_ms: u64) -> bool {
        self.refill(now_ms);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Current token count, for inspection.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Add tokens proportional to elapsed time, capped at capacity.
    ///
    /// Elapsed time is clamped at zero: a clock that moves backwards must
    /// neither drain tokens nor rewind the refill timestamp.
    fn refill(&mut self, now_ms: u64) {
        let elapsed_ms = now_ms.saturating_sub(self.last_refill_ms);
        if elapsed_ms > 0 {
            let added = elapsed_ms as f64 * self.refill_rate_per_ms;
            self.tokens = (self.tokens + added).min(self.capacity);
            self.last_refill_ms = now_ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_bucket_starts_full() {
        let bucket = TokenBucket::new_at(10, 5.0, 1_000);
        assert_eq!(bucket.tokens(), 10.0);
    }

    #[test]
    fn test_consumes_exactly_capacity_with_zero_refill() {
        let mut bucket = TokenBucket::new_at(10, 0.0, 1_000);

        for _ in 0..10 {
            assert!(bucket.try_consume_at(1_000));
        }
        assert!(!bucket.try_consume_at(1_000));
        assert!(!bucket.try_consume_at(2_000));
    }

    #[test]
    fn test_refill_restores_tokens_over_time() {
        // 5 tokens/s = 1 token every 200 ms
        let mut bucket = TokenBucket::new_at(1, 5.0, 1_000);

        assert!(bucket.try_consume_at(1_000));
        assert!(!bucket.try_consume_at(1_000));

        // 200 ms later one token has accumulated
        assert!(bucket.try_consume_at(1_200));
        assert!(!bucket.try_consume_at(1_200));
    }

    #[test]
    fn test_refill_never_exceeds_capacity() {
        let mut bucket = TokenBucket::new_at(10, 5.0, 1_000);

        // Idle far longer than capacity / rate
        assert!(bucket.try_consume_at(3_600_000));
        assert_eq!(bucket.tokens(), 9.0);
    }

    #[test]
    fn test_backwards_clock_does_not_drain_or_rewind() {
        let mut bucket = TokenBucket::new_at(2, 5.0, 10_000);

        assert!(bucket.try_consume_at(10_000));
        // Clock jumps backwards: no refill, no timestamp rewind, one token left
        assert!(bucket.try_consume_at(5_000));
        assert!(!bucket.try_consume_at(5_000));
        assert_eq!(bucket.last_refill_ms, 10_000);
    }

    #[test]
    fn test_one_millisecond_tick_accumulates() {
        let mut bucket = TokenBucket::new_at(1, 5.0, 0);
        assert!(bucket.try_consume_at(0));

        // 1 ms at 5 tokens/s adds 0.005 tokens; 200 ticks reach a whole token
        for now in 1..=199 {
            assert!(!bucket.try_consume_at(now));
        }
        assert!(bucket.try_consume_at(200));
    }
}
