//! Tracing setup for binaries and tests embedding the runtime.
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! left to the embedding program. [`init_tracing`] installs a formatted
//! subscriber filtered by `RUST_LOG`, falling back to `default_filter`.

use tracing_subscriber::EnvFilter;

/// Installs a global `fmt` subscriber.
///
/// The filter is read from `RUST_LOG`; when unset or invalid, `default_filter`
/// (for example `"tracegraph=info"`) is used. Fails if a global subscriber is
/// already installed.
pub fn init_tracing(default_filter: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(true)
    .try_init()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_second_init_fails() {
    // Another test may have installed a subscriber first; either way the
    // second call must fail.
    let _ = init_tracing("tracegraph=debug");
    assert!(init_tracing("tracegraph=debug").is_err());
  }
}
