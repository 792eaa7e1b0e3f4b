//! Service configuration.

use serde::{Deserialize, Serialize};

use super::retry::ConflictRetryPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Upper bound on role preferences per registration.
    pub max_role_choices: usize,

    pub conflict_retry: ConflictRetryPolicy,

    /// Also republish when an operation turned out to be a no-op
    /// (re-join, leave without registration).
    pub republish_on_noop: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_role_choices: 7,
            conflict_retry: ConflictRetryPolicy::default(),
            republish_on_noop: false,
        }
    }
}

impl ServiceConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_reasonable() {
        let config = ServiceConfig::default();

        assert_eq!(config.max_role_choices, 7);
        assert_eq!(config.conflict_retry.max_retries, 2);
        assert!(!config.republish_on_noop);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"
        {
          "conflict_retry": { "max_retries": 5 }
        }"#;

        let config = ServiceConfig::from_json(json).expect("deserialize");

        assert_eq!(config.max_role_choices, 7);
        assert_eq!(config.conflict_retry.max_retries, 5);
        assert_eq!(config.conflict_retry.base_delay_ms, 20);
    }
}
