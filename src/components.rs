//! # Built-in Components
//!
//! General-purpose component implementations, usable directly or as models for
//! new components.
//!
//! | Class                | Kind   | Ports       | Behavior                                   |
//! |----------------------|--------|-------------|--------------------------------------------|
//! | `source.counter`     | Source | out         | Emits `i64` values `start..start + count`  |
//! | `filter.passthrough` | Filter | in → out    | Forwards every message unchanged           |
//! | `sink.discard`       | Sink   | in          | Drops every message                        |
//!
//! [`VecSource`], [`FnFilter`] and [`CollectSink`] build classes around caller
//! data and closures; they are not registered by default.

use crate::class::ComponentClass;
use crate::component::{Filter, Lifecycle, Message, Pull, Sink, Source};
use crate::error::ComponentError;
use crate::executor::Upstream;
use crate::value::ConfigMap;
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The classes registered by [`Registry::with_builtins`](crate::registry::Registry::with_builtins).
pub fn builtin_classes() -> Vec<ComponentClass> {
  vec![
    CounterSource::class(),
    ComponentClass::filter("filter.passthrough", PassthroughFilter::default)
      .with_input("in")
      .with_output("out")
      .with_description("Forwards every message unchanged"),
    ComponentClass::sink("sink.discard", DiscardSink::default)
      .with_input("in")
      .with_description("Drops every message"),
  ]
}

/// Source emitting consecutive integers.
///
/// Configuration: `count` (integer, required, not negative) and `start`
/// (integer, default 0).
#[derive(Debug, Default)]
pub struct CounterSource {
  next: i64,
  end: i64,
}

impl CounterSource {
  /// The `source.counter` class.
  pub fn class() -> ComponentClass {
    ComponentClass::source("source.counter", CounterSource::default)
      .with_output("out")
      .with_description("Emits consecutive integers")
      .with_help("Parameters: count (integer, required), start (integer, default 0)")
  }
}

impl Lifecycle for CounterSource {
  fn initialize(&mut self, config: &ConfigMap) -> Result<(), ComponentError> {
    let count = match config.get("count") {
      Some(value) => value
        .as_i64()
        .ok_or_else(|| format!("'count' must be an integer, got {}", value.kind_name()))?,
      None => return Err("missing required parameter 'count'".into()),
    };
    if count < 0 {
      return Err(format!("'count' must not be negative, got {}", count).into());
    }
    let start = match config.get("start") {
      Some(value) => value
        .as_i64()
        .ok_or_else(|| format!("'start' must be an integer, got {}", value.kind_name()))?,
      None => 0,
    };
    self.next = start;
    self.end = start
      .checked_add(count)
      .ok_or("'start' + 'count' overflows")?;
    Ok(())
  }
}

#[async_trait]
impl Source for CounterSource {
  async fn pull(&mut self, _port: &str) -> Result<Pull, ComponentError> {
    if self.next >= self.end {
      return Ok(Pull::EndOfStream);
    }
    let value = self.next;
    self.next += 1;
    Ok(Pull::Message(Arc::new(value)))
  }
}

/// Source emitting a fixed list of messages, then end of stream.
pub struct VecSource {
  items: Arc<[Message]>,
  next: usize,
}

impl VecSource {
  /// Creates a source emitting `items` in order.
  pub fn new(items: Vec<Message>) -> Self {
    Self {
      items: items.into(),
      next: 0,
    }
  }

  /// A source class named `name` whose instances emit `items` on port `out`.
  pub fn class<T>(name: impl Into<String>, items: Vec<T>) -> ComponentClass
  where
    T: Any + Send + Sync,
  {
    let items: Arc<[Message]> = items
      .into_iter()
      .map(|item| Arc::new(item) as Message)
      .collect();
    ComponentClass::source(name, move || VecSource {
      items: Arc::clone(&items),
      next: 0,
    })
    .with_output("out")
  }
}

impl Lifecycle for VecSource {}

#[async_trait]
impl Source for VecSource {
  async fn pull(&mut self, _port: &str) -> Result<Pull, ComponentError> {
    match self.items.get(self.next) {
      Some(item) => {
        self.next += 1;
        Ok(Pull::Message(Arc::clone(item)))
      }
      None => Ok(Pull::EndOfStream),
    }
  }
}

/// Filter forwarding every message of port `in`.
#[derive(Debug, Default)]
pub struct PassthroughFilter;

impl Lifecycle for PassthroughFilter {}

#[async_trait]
impl Filter for PassthroughFilter {
  async fn pull(
    &mut self,
    _port: &str,
    upstream: &mut Upstream<'_>,
  ) -> Result<Pull, ComponentError> {
    upstream.pull("in").await
  }
}

/// Transformation applied by [`FnFilter`]: `Ok(None)` drops the message.
pub type FilterFn = Arc<dyn Fn(Message) -> Result<Option<Message>, ComponentError> + Send + Sync>;

/// Filter mapping or dropping each message of port `in` with a closure.
pub struct FnFilter {
  f: FilterFn,
}

impl FnFilter {
  /// Creates a filter applying `f`.
  pub fn new(f: FilterFn) -> Self {
    Self { f }
  }

  /// A filter class named `name` applying `f`, with ports `in` and `out`.
  pub fn class<F>(name: impl Into<String>, f: F) -> ComponentClass
  where
    F: Fn(Message) -> Result<Option<Message>, ComponentError> + Send + Sync + 'static,
  {
    let f: FilterFn = Arc::new(f);
    ComponentClass::filter(name, move || FnFilter::new(Arc::clone(&f)))
      .with_input("in")
      .with_output("out")
  }
}

impl Lifecycle for FnFilter {}

#[async_trait]
impl Filter for FnFilter {
  async fn pull(
    &mut self,
    _port: &str,
    upstream: &mut Upstream<'_>,
  ) -> Result<Pull, ComponentError> {
    loop {
      match upstream.pull("in").await? {
        Pull::Message(message) => {
          if let Some(out) = (self.f)(message)? {
            return Ok(Pull::Message(out));
          }
        }
        other => return Ok(other),
      }
    }
  }
}

/// Sink dropping every message.
#[derive(Debug, Default)]
pub struct DiscardSink {
  consumed: u64,
}

impl Lifecycle for DiscardSink {}

#[async_trait]
impl Sink for DiscardSink {
  async fn consume(&mut self, _port: &str, _message: Message) -> Result<(), ComponentError> {
    self.consumed += 1;
    Ok(())
  }
}

/// Shared view of the messages received by a [`CollectSink`].
#[derive(Clone, Default)]
pub struct Collected {
  messages: Arc<Mutex<Vec<Message>>>,
}

impl Collected {
  /// Number of messages received.
  pub async fn len(&self) -> usize {
    self.messages.lock().await.len()
  }

  /// Whether no message was received.
  pub async fn is_empty(&self) -> bool {
    self.messages.lock().await.is_empty()
  }

  /// The received messages, in arrival order.
  pub async fn messages(&self) -> Vec<Message> {
    self.messages.lock().await.clone()
  }

  /// The received messages of type `T`, in arrival order. Other messages are
  /// skipped.
  pub async fn values<T: Any + Clone>(&self) -> Vec<T> {
    self
      .messages
      .lock()
      .await
      .iter()
      .filter_map(|m| m.downcast_ref::<T>().cloned())
      .collect()
  }
}

/// Sink recording every message it receives.
pub struct CollectSink {
  collected: Collected,
}

impl CollectSink {
  /// Creates a sink recording into `collected`.
  pub fn new(collected: Collected) -> Self {
    Self { collected }
  }

  /// A sink class named `name` with input port `in`, and the handle through
  /// which its instances' messages can be read.
  pub fn class(name: impl Into<String>) -> (ComponentClass, Collected) {
    let collected = Collected::default();
    let handle = collected.clone();
    let class = ComponentClass::sink(name, move || CollectSink::new(collected.clone()))
      .with_input("in");
    (class, handle)
  }
}

impl Lifecycle for CollectSink {}

#[async_trait]
impl Sink for CollectSink {
  async fn consume(&mut self, _port: &str, message: Message) -> Result<(), ComponentError> {
    self.collected.messages.lock().await.push(message);
    Ok(())
  }
}
