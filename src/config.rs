//! Executor configuration.
//!
//! [`ExecutorConfig`] holds the knobs of the default backoff policy. It can be
//! built in code with the `with_*` setters or loaded from JSON; missing fields
//! take their defaults.
//!
//! ```rust
//! use tracegraph::config::ExecutorConfig;
//!
//! let config = ExecutorConfig::from_json(r#"{ "max_idle_rounds": 50 }"#).unwrap();
//! assert_eq!(config.max_idle_rounds, Some(50));
//! assert_eq!(config.initial_backoff_ms, 1);
//! ```

use crate::executor::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of the graph executor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
  /// Delay after the first round without progress, in milliseconds.
  pub initial_backoff_ms: u64,
  /// Upper bound for a single backoff delay, in milliseconds.
  pub max_backoff_ms: u64,
  /// Consecutive rounds without progress tolerated before the run stalls.
  /// None = wait forever.
  pub max_idle_rounds: Option<u32>,
}

impl ExecutorConfig {
  /// Parses a configuration from JSON.
  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }

  /// Sets the initial backoff delay.
  pub fn with_initial_backoff(mut self, delay: Duration) -> Self {
    self.initial_backoff_ms = delay.as_millis() as u64;
    self
  }

  /// Sets the maximum backoff delay.
  pub fn with_max_backoff(mut self, delay: Duration) -> Self {
    self.max_backoff_ms = delay.as_millis() as u64;
    self
  }

  /// Sets the number of idle rounds tolerated (None = unbounded).
  pub fn with_max_idle_rounds(mut self, n: Option<u32>) -> Self {
    self.max_idle_rounds = n;
    self
  }

  /// Builds the backoff policy described by this configuration.
  pub fn backoff(&self) -> ExponentialBackoff {
    ExponentialBackoff::new(
      Duration::from_millis(self.initial_backoff_ms),
      Duration::from_millis(self.max_backoff_ms.max(self.initial_backoff_ms)),
    )
    .with_max_idle_rounds(self.max_idle_rounds)
  }
}

impl Default for ExecutorConfig {
  fn default() -> Self {
    let backoff = ExponentialBackoff::default();
    Self {
      initial_backoff_ms: backoff.initial.as_millis() as u64,
      max_backoff_ms: backoff.max.as_millis() as u64,
      max_idle_rounds: backoff.max_idle_rounds,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_matches_default_backoff() {
    assert_eq!(ExecutorConfig::default().backoff(), ExponentialBackoff::default());
  }

  #[test]
  fn test_from_json_overrides_fields() {
    let config =
      ExecutorConfig::from_json(r#"{"initial_backoff_ms": 5, "max_backoff_ms": 2, "max_idle_rounds": null}"#)
        .unwrap();
    assert_eq!(config.max_idle_rounds, None);
    let backoff = config.backoff();
    assert_eq!(backoff.initial, Duration::from_millis(5));
    // max never drops below initial
    assert_eq!(backoff.max, Duration::from_millis(5));
  }

  #[test]
  fn test_builder() {
    let config = ExecutorConfig::default()
      .with_initial_backoff(Duration::from_millis(3))
      .with_max_backoff(Duration::from_millis(30))
      .with_max_idle_rounds(Some(7));
    assert_eq!(config.initial_backoff_ms, 3);
    assert_eq!(config.max_backoff_ms, 30);
    assert_eq!(config.max_idle_rounds, Some(7));
  }
}
