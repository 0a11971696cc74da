//! # Components
//!
//! This module defines the behavior traits implemented by sources, filters and
//! sinks, and the [`Component`] record a graph keeps for every instance.
//!
//! ## Component Kinds
//!
//! Every component is one of three kinds, carried by the tagged [`Behavior`]
//! variant rather than by casting:
//!
//! - **[`Source`]**: answers pulls on its output ports by producing messages.
//! - **[`Filter`]**: answers pulls on its output ports, pulling from its own
//!   input ports through an [`Upstream`] handle as needed.
//! - **[`Sink`]**: receives the messages the executor pulls on its behalf.
//!
//! ## Pull Results
//!
//! A pull yields a [`Pull`]: a message, `Again` when no data is available yet
//! (backpressure, the executor retries later), or `EndOfStream` once no further
//! data will arrive on that port.
//!
//! ## Lifecycle
//!
//! ```text
//! Created --initialize--> Initialized --first step--> Running --> Finalized
//!                              |                                      ^
//!                              +-------------- teardown --------------+
//! ```
//!
//! `finalize` releases component resources exactly once; calling it again is a
//! no-op.
//!
//! ## Messages
//!
//! The core does not own a data model. Messages are type-erased
//! `Arc<dyn Any + Send + Sync>` values, and components downcast to the types they
//! expect:
//!
//! ```rust
//! use std::sync::Arc;
//! use tracegraph::component::Message;
//!
//! let message: Message = Arc::new(42i64);
//! assert_eq!(message.downcast_ref::<i64>(), Some(&42));
//! ```

use crate::class::{ComponentClass, ComponentKind, PortDirection};
use crate::error::{ComponentError, InitError};
use crate::executor::Upstream;
use crate::graph::GraphId;
use crate::port::{Port, PortId, PortInfo};
use crate::value::ConfigMap;
use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A type-erased message flowing between components.
pub type Message = Arc<dyn Any + Send + Sync>;

/// Result of pulling one port.
#[derive(Clone)]
pub enum Pull {
  /// A message is available.
  Message(Message),
  /// No data is available yet; try again later.
  Again,
  /// No further data will arrive on this port.
  EndOfStream,
}

impl Pull {
  /// Whether this is [`Pull::EndOfStream`].
  pub fn is_end_of_stream(&self) -> bool {
    matches!(self, Pull::EndOfStream)
  }
}

impl fmt::Debug for Pull {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Pull::Message(_) => f.write_str("Pull::Message(..)"),
      Pull::Again => f.write_str("Pull::Again"),
      Pull::EndOfStream => f.write_str("Pull::EndOfStream"),
    }
  }
}

/// Initialization and finalization hooks shared by every component kind.
pub trait Lifecycle: Send {
  /// Interprets the component configuration and acquires resources.
  fn initialize(&mut self, _config: &ConfigMap) -> Result<(), ComponentError> {
    Ok(())
  }

  /// Releases the resources acquired by `initialize`.
  ///
  /// Called at most once per component.
  fn finalize(&mut self) -> Result<(), ComponentError> {
    Ok(())
  }
}

/// A component producing messages.
#[async_trait]
pub trait Source: Lifecycle {
  /// Produces the next message for output port `port`.
  async fn pull(&mut self, port: &str) -> Result<Pull, ComponentError>;
}

/// A component transforming messages.
#[async_trait]
pub trait Filter: Lifecycle {
  /// Produces the next message for output port `port`, pulling from the
  /// filter's input ports through `upstream`.
  async fn pull(&mut self, port: &str, upstream: &mut Upstream<'_>)
    -> Result<Pull, ComponentError>;
}

/// A component consuming messages.
#[async_trait]
pub trait Sink: Lifecycle {
  /// Consumes one message received on input port `port`.
  async fn consume(&mut self, port: &str, message: Message) -> Result<(), ComponentError>;

  /// Called once when input port `port` reaches end of stream.
  fn end_of_stream(&mut self, _port: &str) -> Result<(), ComponentError> {
    Ok(())
  }
}

/// The behavior of a component, tagged by kind.
pub enum Behavior {
  /// Source behavior.
  Source(Box<dyn Source>),
  /// Filter behavior.
  Filter(Box<dyn Filter>),
  /// Sink behavior.
  Sink(Box<dyn Sink>),
}

impl Behavior {
  /// Kind of the wrapped behavior.
  pub fn kind(&self) -> ComponentKind {
    match self {
      Behavior::Source(_) => ComponentKind::Source,
      Behavior::Filter(_) => ComponentKind::Filter,
      Behavior::Sink(_) => ComponentKind::Sink,
    }
  }

  /// Checked view as a source.
  pub fn as_source(&mut self) -> Option<&mut (dyn Source + 'static)> {
    match self {
      Behavior::Source(s) => Some(s.as_mut()),
      _ => None,
    }
  }

  /// Checked view as a filter.
  pub fn as_filter(&mut self) -> Option<&mut (dyn Filter + 'static)> {
    match self {
      Behavior::Filter(f) => Some(f.as_mut()),
      _ => None,
    }
  }

  /// Checked view as a sink.
  pub fn as_sink(&mut self) -> Option<&mut (dyn Sink + 'static)> {
    match self {
      Behavior::Sink(s) => Some(s.as_mut()),
      _ => None,
    }
  }

  fn initialize(&mut self, config: &ConfigMap) -> Result<(), ComponentError> {
    match self {
      Behavior::Source(s) => s.initialize(config),
      Behavior::Filter(f) => f.initialize(config),
      Behavior::Sink(s) => s.initialize(config),
    }
  }

  fn finalize(&mut self) -> Result<(), ComponentError> {
    match self {
      Behavior::Source(s) => s.finalize(),
      Behavior::Filter(f) => f.finalize(),
      Behavior::Sink(s) => s.finalize(),
    }
  }
}

impl fmt::Debug for Behavior {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Behavior::{:?}", self.kind())
  }
}

/// Index of a component within its graph, in creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(pub(crate) usize);

impl ComponentId {
  /// Position of the component in creation order.
  pub fn index(self) -> usize {
    self.0
  }
}

impl fmt::Display for ComponentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Run-state of a component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
  /// Instantiated, not yet initialized.
  Created,
  /// Initialized successfully.
  Initialized,
  /// Taking part in a run.
  Running,
  /// Resources released; terminal.
  Finalized,
}

/// A component instance owned by a graph.
pub struct Component {
  id: ComponentId,
  graph: GraphId,
  name: String,
  class: Arc<ComponentClass>,
  state: RunState,
  ports: Vec<Port>,
  behavior: Option<Behavior>,
}

impl Component {
  pub(crate) fn new(
    graph: GraphId,
    id: ComponentId,
    name: String,
    class: Arc<ComponentClass>,
  ) -> Self {
    let ports = class
      .ports()
      .iter()
      .map(|descriptor| Port::new(descriptor.name.clone(), descriptor.direction))
      .collect();
    let behavior = class.instantiate();
    Self {
      id,
      graph,
      name,
      class,
      state: RunState::Created,
      ports,
      behavior: Some(behavior),
    }
  }

  /// Id of the component.
  pub fn id(&self) -> ComponentId {
    self.id
  }

  /// Name of the component, unique within its graph.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Class the component was instantiated from.
  pub fn class(&self) -> &ComponentClass {
    &self.class
  }

  /// Kind of the component.
  pub fn kind(&self) -> ComponentKind {
    self.class.kind()
  }

  /// Whether this is a source.
  pub fn is_source(&self) -> bool {
    self.class.is_source()
  }

  /// Whether this is a filter.
  pub fn is_filter(&self) -> bool {
    self.class.is_filter()
  }

  /// Whether this is a sink.
  pub fn is_sink(&self) -> bool {
    self.class.is_sink()
  }

  /// Current run-state.
  pub fn state(&self) -> RunState {
    self.state
  }

  /// Handle of the input port named `name`.
  pub fn input_port(&self, name: &str) -> Option<PortId> {
    self.port_id(name, PortDirection::Input)
  }

  /// Handle of the output port named `name`.
  pub fn output_port(&self, name: &str) -> Option<PortId> {
    self.port_id(name, PortDirection::Output)
  }

  /// Snapshots of all ports, in schema order.
  pub fn ports(&self) -> impl Iterator<Item = PortInfo> + '_ {
    (0..self.ports.len()).map(move |index| self.port_info(index))
  }

  /// Names of the input ports, in schema order.
  pub fn input_port_names(&self) -> impl Iterator<Item = &str> {
    self
      .ports
      .iter()
      .filter(|p| p.direction == PortDirection::Input)
      .map(|p| p.name.as_str())
  }

  /// Runs the component's initialization routine with `config`.
  ///
  /// Only valid in the `Created` state.
  pub fn initialize(&mut self, config: &ConfigMap) -> Result<(), InitError> {
    trace!("Component::initialize(name={})", self.name);
    let result = match (self.state, self.behavior.as_mut()) {
      (RunState::Created, Some(behavior)) => behavior.initialize(config),
      (state, _) => Err(format!("cannot initialize a component in state {:?}", state).into()),
    };
    result.map_err(|cause| InitError {
      component: self.name.clone(),
      class: self.class.name().to_string(),
      cause,
    })?;
    self.state = RunState::Initialized;
    Ok(())
  }

  /// Releases the component's resources.
  ///
  /// The state is `Finalized` afterwards even if the component reports an
  /// error. Calling `finalize` on a finalized component does nothing.
  pub fn finalize(&mut self) -> Result<(), ComponentError> {
    if self.state == RunState::Finalized {
      return Ok(());
    }
    trace!("Component::finalize(name={})", self.name);
    let was_initialized = self.state != RunState::Created;
    self.state = RunState::Finalized;
    match self.behavior.as_mut() {
      Some(behavior) if was_initialized => behavior.finalize(),
      _ => Ok(()),
    }
  }

  pub(crate) fn start(&mut self) {
    if self.state == RunState::Initialized {
      self.state = RunState::Running;
    }
  }

  pub(crate) fn port(&self, index: usize) -> Option<&Port> {
    self.ports.get(index)
  }

  pub(crate) fn port_mut(&mut self, index: usize) -> Option<&mut Port> {
    self.ports.get_mut(index)
  }

  pub(crate) fn port_index(&self, name: &str, direction: PortDirection) -> Option<usize> {
    self
      .ports
      .iter()
      .position(|p| p.direction == direction && p.name == name)
  }

  pub(crate) fn port_info(&self, index: usize) -> PortInfo {
    let port = &self.ports[index];
    PortInfo {
      id: self.make_port_id(index),
      name: port.name.clone(),
      direction: port.direction,
      component: self.id,
      connection: port.connection,
      at_end: port.at_end,
    }
  }

  pub(crate) fn take_behavior(&mut self) -> Option<Behavior> {
    self.behavior.take()
  }

  pub(crate) fn restore_behavior(&mut self, behavior: Behavior) {
    self.behavior = Some(behavior);
  }

  fn port_id(&self, name: &str, direction: PortDirection) -> Option<PortId> {
    self
      .port_index(name, direction)
      .map(|index| self.make_port_id(index))
  }

  fn make_port_id(&self, index: usize) -> PortId {
    PortId {
      graph: self.graph,
      component: self.id,
      index,
      direction: self.ports[index].direction,
    }
  }
}

impl fmt::Debug for Component {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Component")
      .field("id", &self.id)
      .field("name", &self.name)
      .field("class", &self.class.name())
      .field("state", &self.state)
      .finish()
  }
}
