//! Behavior when the coordination store is unreachable.

use serde::{Deserialize, Serialize};

/// Static policy consulted by the distributed limiter when a store call
/// fails. Set at construction; not a state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailMode {
    /// Admit traffic during an outage: favor availability, risk temporary
    /// over-admission.
    Open,
    /// Reject traffic during an outage: favor strict enforcement, risk
    /// false rejection.
    Closed,
}

impl Default for FailMode {
    fn default() -> Self {
        FailMode::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_lowercase_names() {
        assert_eq!(serde_yaml::from_str::<FailMode>("open").unwrap(), FailMode::Open);
        assert_eq!(serde_yaml::from_str::<FailMode>("closed").unwrap(), FailMode::Closed);
    }
}
