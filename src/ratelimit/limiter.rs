//! Rate limiter trait for the authoritative decision path.

use async_trait::async_trait;

/// The caller-facing decision contract: is this ordered key list admitted
/// now?
///
/// A single operation over an ordered key sequence; the single-key call is
/// the length-1 case, not a separate type. The boolean is the only
/// observable output: implementations resolve store failures and other
/// internal conditions themselves.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Evaluate all keys, in order, as one unit. `true` admits the request.
    async fn allow(&self, keys: &[String]) -> bool;

    /// Convenience for non-hierarchical callers.
    async fn allow_key(&self, key: &str) -> bool {
        self.allow(&[key.to_owned()]).await
    }
}
