//! Queue configuration: invisibility timeout and commit policy.

use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What `commit` requires of a message besides being present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitPolicy {
    /// Commit by id, whether or not the visibility window is still open.
    #[default]
    Unconditional,

    /// Reject commits for messages whose window already lapsed
    /// (`CommitError::NotInFlight`). A late consumer cannot delete a message
    /// that may have been handed to someone else.
    RequireInFlight,
}

impl CommitPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            CommitPolicy::Unconditional => "unconditional",
            CommitPolicy::RequireInFlight => "require-in-flight",
        }
    }
}

impl FromStr for CommitPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "unconditional" => Ok(CommitPolicy::Unconditional),
            "require-in-flight" => Ok(CommitPolicy::RequireInFlight),
            _ => Err(ConfigError::UnknownCommitPolicy(s.to_string())),
        }
    }
}

/// Configuration for one queue instance. Read-only once the queue is built.
///
/// Every field has a default, so a config file may set only what it needs.
/// Unknown keys are an error:
///
/// ```toml
/// invisibility_timeout_ms = 10000
/// commit_policy = "require-in-flight"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    /// How long a received message stays hidden from other receivers.
    pub invisibility_timeout_ms: u64,

    pub commit_policy: CommitPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            invisibility_timeout_ms: 5_000,
            commit_policy: CommitPolicy::default(),
        }
    }
}

impl QueueConfig {
    pub fn new(invisibility_timeout: Duration) -> Self {
        Self::default().with_invisibility_timeout(invisibility_timeout)
    }

    pub fn with_invisibility_timeout(mut self, timeout: Duration) -> Self {
        self.invisibility_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_commit_policy(mut self, policy: CommitPolicy) -> Self {
        self.commit_policy = policy;
        self
    }

    pub fn invisibility_timeout(&self) -> Duration {
        Duration::from_millis(self.invisibility_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.invisibility_delta().map(|_| ())
    }

    /// The timeout as a signed delta for date arithmetic.
    ///
    /// Zero is rejected: a message would be visible again the instant it
    /// was received, and two receivers could hold it at once.
    pub(crate) fn invisibility_delta(&self) -> Result<TimeDelta, ConfigError> {
        let ms = self.invisibility_timeout_ms;
        if ms == 0 {
            return Err(ConfigError::ZeroInvisibility);
        }
        i64::try_from(ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .ok_or(ConfigError::OutOfRange(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn default_config_has_reasonable_values() {
        let config = QueueConfig::default();
        assert_eq!(config.invisibility_timeout(), Duration::from_secs(5));
        assert_eq!(config.commit_policy, CommitPolicy::Unconditional);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_sets_fields() {
        let config = QueueConfig::new(Duration::from_secs(10))
            .with_commit_policy(CommitPolicy::RequireInFlight);
        assert_eq!(config.invisibility_timeout_ms, 10_000);
        assert_eq!(config.commit_policy, CommitPolicy::RequireInFlight);
        assert_eq!(config.invisibility_delta().unwrap(), TimeDelta::seconds(10));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = QueueConfig::new(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroInvisibility));
    }

    #[test]
    fn huge_timeout_is_rejected() {
        let config = QueueConfig {
            invisibility_timeout_ms: u64::MAX,
            ..QueueConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::OutOfRange(u64::MAX)));
    }

    #[rstest]
    #[case::plain("unconditional", CommitPolicy::Unconditional)]
    #[case::kebab("require-in-flight", CommitPolicy::RequireInFlight)]
    #[case::snake("require_in_flight", CommitPolicy::RequireInFlight)]
    #[case::upper("UNCONDITIONAL", CommitPolicy::Unconditional)]
    fn commit_policy_parses(#[case] input: &str, #[case] expected: CommitPolicy) {
        assert_eq!(input.parse::<CommitPolicy>().unwrap(), expected);
        assert_eq!(expected.as_str().parse::<CommitPolicy>().unwrap(), expected);
    }

    #[test]
    fn unknown_commit_policy_is_an_error() {
        let err = "sometimes".parse::<CommitPolicy>().unwrap_err();
        assert_eq!(err, ConfigError::UnknownCommitPolicy("sometimes".to_string()));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: QueueConfig =
            serde_json::from_str(r#"{ "commit_policy": "require-in-flight" }"#).unwrap();
        assert_eq!(config.invisibility_timeout_ms, 5_000);
        assert_eq!(config.commit_policy, CommitPolicy::RequireInFlight);
    }

    #[test]
    fn misspelled_key_is_rejected() {
        let result =
            serde_json::from_str::<QueueConfig>(r#"{ "invisibility_timeout_secs": 30 }"#);
        assert!(result.is_err());
    }
}
