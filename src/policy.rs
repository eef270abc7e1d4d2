//! Hierarchical key resolution.
//!
//! Maps the identifiers of a request to the ordered list of store keys
//! the limiter checks. Ordering is check priority: the
//! cheapest-to-exhaust, most attacker-adjacent principal first, so
//! abusive traffic is rejected before it consumes tokens for the broader
//! principals behind it.

use serde::Deserialize;

/// Key namespace prefixes, by principal.
pub const IP_KEY_PREFIX: &str = "rate_limit:ip:";
pub const USER_KEY_PREFIX: &str = "rate_limit:user:";
pub const ORG_KEY_PREFIX: &str = "rate_limit:org:";

/// Principals identifying one request. Each is optional; absent ones are
/// simply skipped during resolution.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestIdentity {
    pub ip: Option<String>,
    pub user: Option<String>,
    pub org: Option<String>,
}

/// Resolves identities into ordered hierarchical key lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyResolver;

impl PolicyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Produce the namespaced keys for every present identifier, in fixed
    /// priority order: IP, then user, then org.
    ///
    /// Empty identifiers are treated as absent; an empty-string key is
    /// never emitted.
    pub fn resolve_keys(&self, identity: &RequestIdentity) -> Vec<String> {
        let mut keys = Vec::with_capacity(3);

        if let Some(ip) = present(&identity.ip) {
            keys.push(format!("{IP_KEY_PREFIX}{ip}"));
        }
        if let Some(user) = present(&identity.user) {
            keys.push(format!("{USER_KEY_PREFIX}{user}"));
        }
        if let Some(org) = present(&identity.org) {
            keys.push(format!("{ORG_KEY_PREFIX}{org}"));
        }

        keys
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
