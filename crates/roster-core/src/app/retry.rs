//! Conflict retry policy: decides whether and when to rerun an operation
//! whose commit lost a race.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for transaction conflicts.
///
/// Exponential backoff: delay = base_delay * multiplier^(retry - 1).
/// `max_retries == 0` surfaces the first conflict as `WriteConflict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictRetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
}

impl ConflictRetryPolicy {
    /// Give up on the first conflict.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Retry immediately, `max_retries` times.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay_ms: 0,
            multiplier: 1.0,
        }
    }

    /// Delay before retry number `retry` (1-indexed).
    ///
    /// Example with base_delay=20ms, multiplier=2.0:
    /// - retry 1: 20ms
    /// - retry 2: 40ms
    /// - retry 3: 80ms
    pub fn next_delay(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.saturating_sub(1) as i32);
        let millis = (self.base_delay_ms as f64 * factor).round();
        Duration::from_millis(millis.max(0.0) as u64)
    }

    pub fn allows(&self, retry: u32) -> bool {
        retry <= self.max_retries
    }
}

impl Default for ConflictRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 20,
            multiplier: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 20)]
    #[case(1, 20)]
    #[case(2, 40)]
    #[case(3, 80)]
    fn exponential_backoff(#[case] retry: u32, #[case] millis: u64) {
        let policy = ConflictRetryPolicy::default();

        assert_eq!(policy.next_delay(retry), Duration::from_millis(millis));
    }

    #[test]
    fn none_allows_no_retry() {
        let policy = ConflictRetryPolicy::none();

        assert!(!policy.allows(1));
    }

    #[test]
    fn immediate_has_no_delay() {
        let policy = ConflictRetryPolicy::immediate(3);

        assert!(policy.allows(3));
        assert!(!policy.allows(4));
        assert_eq!(policy.next_delay(3), Duration::ZERO);
    }
}
