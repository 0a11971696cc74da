//! Instrumented components shared by the unit test suites.
//!
//! Every component records its lifecycle events in a [`Probe`] so tests can
//! observe initialization, consumption and finalization order.

use crate::class::ComponentClass;
use crate::component::{Filter, Lifecycle, Pull, Sink, Source};
use crate::error::ComponentError;
use crate::executor::Upstream;
use crate::value::ConfigMap;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Shared event log and counters.
#[derive(Clone, Default)]
pub(crate) struct Probe {
  events: Arc<Mutex<Vec<String>>>,
  received: Arc<Mutex<HashMap<String, Vec<i64>>>>,
  finalized: Arc<AtomicUsize>,
}

impl Probe {
  pub(crate) fn record(&self, event: impl Into<String>) {
    self.events.lock().unwrap().push(event.into());
  }

  pub(crate) fn events(&self) -> Vec<String> {
    self.events.lock().unwrap().clone()
  }

  /// Number of occurrences of `event`.
  pub(crate) fn count(&self, event: &str) -> usize {
    self.events.lock().unwrap().iter().filter(|e| *e == event).count()
  }

  /// Values received by the sink labelled `label`.
  pub(crate) fn received(&self, label: &str) -> Vec<i64> {
    self
      .received
      .lock()
      .unwrap()
      .get(label)
      .cloned()
      .unwrap_or_default()
  }

  /// Total number of finalize calls across all components.
  pub(crate) fn finalized(&self) -> usize {
    self.finalized.load(Ordering::SeqCst)
  }

  /// Labels in the order their finalize routine ran.
  pub(crate) fn finalize_order(&self) -> Vec<String> {
    self
      .events()
      .into_iter()
      .filter_map(|e| e.strip_prefix("finalize:").map(str::to_string))
      .collect()
  }

  fn finalize(&self, label: &str) {
    self.finalized.fetch_add(1, Ordering::SeqCst);
    self.record(format!("finalize:{}", label));
  }
}

pub(crate) fn empty_config() -> ConfigMap {
  ConfigMap::new()
}

fn value_of(message: &crate::component::Message) -> Result<i64, ComponentError> {
  message
    .downcast_ref::<i64>()
    .copied()
    .ok_or_else(|| "expected an i64 message".into())
}

// ============================================================================
// Source
// ============================================================================

#[derive(Clone, Debug, Default)]
pub(crate) struct SourceSpec {
  pub(crate) values: Vec<i64>,
  /// Answer every other pull with `Again`, starting with the first.
  pub(crate) again_every_other: bool,
  pub(crate) always_again: bool,
  /// Fail instead of emitting the item at this index.
  pub(crate) fail_at: Option<usize>,
  pub(crate) fail_init: bool,
  pub(crate) fail_finalize: bool,
}

impl SourceSpec {
  pub(crate) fn range(n: i64) -> Self {
    Self {
      values: (0..n).collect(),
      ..Default::default()
    }
  }
}

struct TestSource {
  label: String,
  spec: SourceSpec,
  next: usize,
  waiting: bool,
  probe: Probe,
}

impl Lifecycle for TestSource {
  fn initialize(&mut self, _config: &ConfigMap) -> Result<(), ComponentError> {
    self.probe.record(format!("init:{}", self.label));
    if self.spec.fail_init {
      return Err("bad source configuration".into());
    }
    Ok(())
  }

  fn finalize(&mut self) -> Result<(), ComponentError> {
    self.probe.finalize(&self.label);
    if self.spec.fail_finalize {
      return Err(format!("{} could not release its resources", self.label).into());
    }
    Ok(())
  }
}

#[async_trait]
impl Source for TestSource {
  async fn pull(&mut self, _port: &str) -> Result<Pull, ComponentError> {
    if self.spec.always_again {
      return Ok(Pull::Again);
    }
    if self.spec.again_every_other {
      self.waiting = !self.waiting;
      if self.waiting {
        return Ok(Pull::Again);
      }
    }
    if self.spec.fail_at == Some(self.next) {
      return Err(format!("{} failed at item {}", self.label, self.next).into());
    }
    match self.spec.values.get(self.next) {
      Some(value) => {
        self.next += 1;
        Ok(Pull::Message(Arc::new(*value)))
      }
      None => Ok(Pull::EndOfStream),
    }
  }
}

pub(crate) fn source(name: &str, spec: SourceSpec, probe: &Probe) -> ComponentClass {
  let label = name.to_string();
  let probe = probe.clone();
  ComponentClass::source(name, move || TestSource {
    label: label.clone(),
    spec: spec.clone(),
    next: 0,
    waiting: false,
    probe: probe.clone(),
  })
  .with_output("out")
}

// ============================================================================
// Filter
// ============================================================================

#[derive(Clone, Debug, Default)]
pub(crate) struct FilterSpec {
  pub(crate) drop_odd: bool,
  /// Fail when receiving the n-th item (1-based).
  pub(crate) fail_on_item: Option<usize>,
  pub(crate) fail_finalize: bool,
}

struct TestFilter {
  label: String,
  spec: FilterSpec,
  seen: usize,
  probe: Probe,
}

impl Lifecycle for TestFilter {
  fn initialize(&mut self, _config: &ConfigMap) -> Result<(), ComponentError> {
    self.probe.record(format!("init:{}", self.label));
    Ok(())
  }

  fn finalize(&mut self) -> Result<(), ComponentError> {
    self.probe.finalize(&self.label);
    if self.spec.fail_finalize {
      return Err(format!("{} could not release its resources", self.label).into());
    }
    Ok(())
  }
}

#[async_trait]
impl Filter for TestFilter {
  async fn pull(
    &mut self,
    _port: &str,
    upstream: &mut Upstream<'_>,
  ) -> Result<Pull, ComponentError> {
    loop {
      match upstream.pull("in").await? {
        Pull::Message(message) => {
          self.seen += 1;
          if self.spec.fail_on_item == Some(self.seen) {
            return Err(format!("{} rejected item {}", self.label, self.seen).into());
          }
          if self.spec.drop_odd && value_of(&message)? % 2 != 0 {
            continue;
          }
          return Ok(Pull::Message(message));
        }
        other => return Ok(other),
      }
    }
  }
}

pub(crate) fn filter(name: &str, spec: FilterSpec, probe: &Probe) -> ComponentClass {
  let label = name.to_string();
  let probe = probe.clone();
  ComponentClass::filter(name, move || TestFilter {
    label: label.clone(),
    spec: spec.clone(),
    seen: 0,
    probe: probe.clone(),
  })
  .with_input("in")
  .with_output("out")
}

// ============================================================================
// Sink
// ============================================================================

#[derive(Clone, Debug, Default)]
pub(crate) struct SinkSpec {
  /// Fail when consuming the n-th item (1-based).
  pub(crate) fail_on_item: Option<usize>,
  /// Cancel the token after consuming this many items.
  pub(crate) cancel_after: Option<(usize, CancellationToken)>,
  pub(crate) fail_finalize: bool,
}

struct TestSink {
  label: String,
  spec: SinkSpec,
  consumed: usize,
  probe: Probe,
}

impl Lifecycle for TestSink {
  fn initialize(&mut self, _config: &ConfigMap) -> Result<(), ComponentError> {
    self.probe.record(format!("init:{}", self.label));
    Ok(())
  }

  fn finalize(&mut self) -> Result<(), ComponentError> {
    self.probe.finalize(&self.label);
    if self.spec.fail_finalize {
      return Err(format!("{} could not release its resources", self.label).into());
    }
    Ok(())
  }
}

#[async_trait]
impl Sink for TestSink {
  async fn consume(
    &mut self,
    _port: &str,
    message: crate::component::Message,
  ) -> Result<(), ComponentError> {
    let value = value_of(&message)?;
    self.consumed += 1;
    if self.spec.fail_on_item == Some(self.consumed) {
      return Err(format!("{} rejected item {}", self.label, self.consumed).into());
    }
    self.probe.record(format!("{}:{}", self.label, value));
    self
      .probe
      .received
      .lock()
      .unwrap()
      .entry(self.label.clone())
      .or_default()
      .push(value);
    if let Some((limit, token)) = &self.spec.cancel_after {
      if self.consumed == *limit {
        token.cancel();
      }
    }
    Ok(())
  }

  fn end_of_stream(&mut self, port: &str) -> Result<(), ComponentError> {
    self.probe.record(format!("eos:{}.{}", self.label, port));
    Ok(())
  }
}

pub(crate) fn sink(name: &str, spec: SinkSpec, probe: &Probe) -> ComponentClass {
  let label = name.to_string();
  let probe = probe.clone();
  ComponentClass::sink(name, move || TestSink {
    label: label.clone(),
    spec: spec.clone(),
    consumed: 0,
    probe: probe.clone(),
  })
  .with_input("in")
}
