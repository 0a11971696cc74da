//! # Graph
//!
//! This module defines the [`Graph`]: the owner of all components and
//! connections of one processing pipeline.
//!
//! ## Structure Management (Synchronous)
//!
//! - [`Graph::add_component`] instantiates a component from a class, runs its
//!   initialization routine and takes ownership of it.
//! - [`Graph::connect`] links an output port to an input port.
//!
//! Both calls either succeed completely or leave the graph untouched.
//!
//! ## Freezing
//!
//! The topology is mutable only until the first executor step. Afterwards every
//! mutation fails with [`GraphFrozenError`].
//!
//! ## Execution (Asynchronous)
//!
//! Execution is implemented in [`crate::executor`]: [`Graph::run`] drives the
//! graph to completion, [`Graph::run_once`] performs a single round.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tracegraph::class::ComponentClass;
//! use tracegraph::components::{CollectSink, VecSource};
//! use tracegraph::graph::Graph;
//! use tracegraph::value::ConfigMap;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = Arc::new(VecSource::class("source.numbers", (0..3i64).collect()));
//! let (sink, collected) = CollectSink::class("sink.collect");
//!
//! let mut graph = Graph::new("numbers");
//! graph.add_component(source, "src", &ConfigMap::new())?;
//! graph.add_component(Arc::new(sink), "out", &ConfigMap::new())?;
//! graph.connect_by_name("src", "out", "out", "in")?;
//!
//! let summary = graph.run().await?;
//! assert_eq!(summary.messages, 3);
//! assert_eq!(collected.len().await, 3);
//! # Ok(())
//! # }
//! ```

use crate::class::{ComponentClass, ComponentKind, PortDirection};
use crate::component::{Component, ComponentId};
use crate::config::ExecutorConfig;
use crate::error::{
  AddComponentError, ConnectError, FinalizeFailure, GraphFrozenError, TeardownError,
  ValidationError,
};
use crate::executor::{BackoffPolicy, RunStats};
use crate::port::{Connection, ConnectionId, PortId, PortInfo};
use crate::value::ConfigMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GraphId(u64);

impl GraphId {
  pub(crate) fn next() -> Self {
    Self(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed))
  }
}

/// Lifecycle state of a graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphState {
  /// Topology can still change.
  Configuring,
  /// Execution started; topology frozen.
  Running,
  /// Every sink input reached end of stream.
  Finished,
  /// Execution was cancelled.
  Cancelled,
  /// Execution halted on an error.
  Faulted,
  /// Torn down without (or after) running.
  TornDown,
}

/// A graph of components and the connections between their ports.
pub struct Graph {
  id: GraphId,
  name: String,
  pub(crate) components: Vec<Component>,
  pub(crate) connections: Vec<Connection>,
  pub(crate) sinks: Vec<ComponentId>,
  pub(crate) state: GraphState,
  pub(crate) cancel: CancellationToken,
  pub(crate) backoff: Arc<dyn BackoffPolicy>,
  pub(crate) stats: RunStats,
}

impl Graph {
  /// Creates an empty graph using the default executor configuration.
  pub fn new(name: impl Into<String>) -> Self {
    Self::with_config(name, &ExecutorConfig::default())
  }

  /// Creates an empty graph whose executor follows `config`.
  pub fn with_config(name: impl Into<String>, config: &ExecutorConfig) -> Self {
    let name = name.into();
    trace!("Graph::with_config(name={}, config={:?})", name, config);
    Self {
      id: GraphId::next(),
      name,
      components: Vec::new(),
      connections: Vec::new(),
      sinks: Vec::new(),
      state: GraphState::Configuring,
      cancel: CancellationToken::new(),
      backoff: Arc::new(config.backoff()),
      stats: RunStats::default(),
    }
  }

  /// Replaces the policy deciding how long to wait when no component has data.
  pub fn with_backoff_policy(mut self, policy: Arc<dyn BackoffPolicy>) -> Self {
    self.backoff = policy;
    self
  }

  /// Identity of the graph.
  pub fn id(&self) -> GraphId {
    self.id
  }

  /// Name of the graph.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Current lifecycle state.
  pub fn state(&self) -> GraphState {
    self.state
  }

  /// Whether the topology can no longer change.
  pub fn is_frozen(&self) -> bool {
    self.state != GraphState::Configuring
  }

  /// All components, in creation order.
  pub fn components(&self) -> impl Iterator<Item = &Component> {
    self.components.iter()
  }

  /// The component with id `id`.
  pub fn component(&self, id: ComponentId) -> Option<&Component> {
    self.components.get(id.0)
  }

  /// The component named `name`.
  pub fn find_component(&self, name: &str) -> Option<&Component> {
    self.components.iter().find(|c| c.name() == name)
  }

  /// Sink components, in the order they were added.
  pub fn sinks(&self) -> &[ComponentId] {
    &self.sinks
  }

  /// All connections, in creation order.
  pub fn connections(&self) -> &[Connection] {
    &self.connections
  }

  /// The connection with id `id`.
  pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
    self.connections.get(id.0)
  }

  /// Snapshot of the port `port`, if it belongs to this graph.
  pub fn port(&self, port: PortId) -> Option<PortInfo> {
    if port.graph != self.id {
      return None;
    }
    let component = self.component(port.component)?;
    component.port(port.index)?;
    Some(component.port_info(port.index))
  }

  /// The port connected to `port`, if any.
  pub fn peer(&self, port: PortId) -> Option<PortId> {
    let connection = self.port(port)?.connection?;
    self.connections.get(connection.0)?.peer_of(port)
  }

  /// Instantiates `class` as a component named `name` and initializes it with
  /// `config`.
  ///
  /// On any error the graph is left unchanged.
  pub fn add_component(
    &mut self,
    class: Arc<ComponentClass>,
    name: &str,
    config: &ConfigMap,
  ) -> Result<ComponentId, AddComponentError> {
    trace!(
      "Graph::add_component(graph={}, class={}, name={})",
      self.name,
      class.name(),
      name
    );
    self.ensure_mutable()?;
    class.validate()?;
    if self.find_component(name).is_some() {
      return Err(AddComponentError::DuplicateName(name.to_string()));
    }

    let id = ComponentId(self.components.len());
    let mut component = Component::new(self.id, id, name.to_string(), class);
    component.initialize(config)?;

    if component.kind() == ComponentKind::Sink {
      self.sinks.push(id);
    }
    self.components.push(component);
    debug!(graph = %self.name, component = %name, id = %id, "component added");
    Ok(id)
  }

  /// Connects an output port to an input port.
  ///
  /// The two ports may be given in either order.
  ///
  /// # Errors
  ///
  /// - [`ConnectError::Frozen`] once execution started
  /// - [`ConnectError::ForeignGraph`] if a port belongs to another graph
  /// - [`ConnectError::DirectionMismatch`] unless one port is an output and the
  ///   other an input
  /// - [`ConnectError::SelfLoop`] if both ports belong to the same component
  /// - [`ConnectError::AlreadyConnected`] if either port holds a connection
  pub fn connect(&mut self, a: PortId, b: PortId) -> Result<Connection, ConnectError> {
    trace!("Graph::connect(graph={}, a={:?}, b={:?})", self.name, a, b);
    self.ensure_mutable()?;
    if a.graph != self.id || b.graph != self.id {
      return Err(ConnectError::ForeignGraph);
    }
    let (upstream, downstream) = match (a.direction, b.direction) {
      (PortDirection::Output, PortDirection::Input) => (a, b),
      (PortDirection::Input, PortDirection::Output) => (b, a),
      (first, second) => {
        return Err(ConnectError::DirectionMismatch {
          upstream: first,
          downstream: second,
        })
      }
    };
    let up = self.port(upstream).ok_or_else(|| unknown_port(upstream))?;
    let down = self.port(downstream).ok_or_else(|| unknown_port(downstream))?;
    if upstream.component == downstream.component {
      return Err(ConnectError::SelfLoop {
        component: self.components[upstream.component.0].name().to_string(),
      });
    }
    for (port, info) in [(upstream, &up), (downstream, &down)] {
      if info.is_connected() {
        return Err(ConnectError::AlreadyConnected {
          component: self.components[port.component.0].name().to_string(),
          port: info.name.clone(),
        });
      }
    }

    let connection = Connection {
      id: ConnectionId(self.connections.len()),
      upstream,
      downstream,
    };
    for port in [upstream, downstream] {
      if let Some(slot) = self.components[port.component.0].port_mut(port.index) {
        slot.connection = Some(connection.id);
      }
    }
    self.connections.push(connection);
    debug!(
      graph = %self.name,
      from = %format!("{}.{}", self.components[upstream.component.0].name(), up.name),
      to = %format!("{}.{}", self.components[downstream.component.0].name(), down.name),
      "ports connected"
    );
    Ok(connection)
  }

  /// Connects output port `output` of component `upstream` to input port
  /// `input` of component `downstream`.
  pub fn connect_by_name(
    &mut self,
    upstream: &str,
    output: &str,
    downstream: &str,
    input: &str,
  ) -> Result<Connection, ConnectError> {
    let out = self.resolve_port(upstream, output, PortDirection::Output)?;
    let inp = self.resolve_port(downstream, input, PortDirection::Input)?;
    self.connect(out, inp)
  }

  /// Token cancelling the run of this graph.
  ///
  /// Cancellation takes effect at the next safe point, after the current pull
  /// step completes.
  pub fn cancellation_token(&self) -> CancellationToken {
    self.cancel.clone()
  }

  /// Requests cancellation of the run.
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  /// Checks that the graph can run.
  ///
  /// Requires at least one sink; every input port a sink depends on must be
  /// connected; every sink input must be fed by a source; the connections must
  /// not form a cycle.
  pub fn validate(&self) -> Result<(), ValidationError> {
    if self.sinks.is_empty() {
      return Err(ValidationError::NoSink);
    }
    let mut marks = vec![Mark::Unvisited; self.components.len()];
    for &sink in &self.sinks {
      let component = &self.components[sink.0];
      for port in component.ports().filter(|p| p.is_input()) {
        let upstream = self.upstream_of(component, &port)?;
        if !self.visit(upstream, &mut marks)? {
          return Err(ValidationError::Unreachable {
            component: component.name().to_string(),
            port: port.name,
          });
        }
      }
    }
    Ok(())
  }

  /// Finalizes every live component in reverse creation order.
  ///
  /// The graph cannot run afterwards. Calling `teardown` again does nothing.
  pub fn teardown(&mut self) -> Result<(), TeardownError> {
    trace!("Graph::teardown(name={})", self.name);
    if matches!(self.state, GraphState::Configuring | GraphState::Running) {
      self.state = GraphState::TornDown;
    }
    let failures = self.finalize_all();
    if failures.is_empty() {
      Ok(())
    } else {
      Err(TeardownError { failures })
    }
  }

  /// Finalizes every component that is not finalized yet, in reverse creation
  /// order, collecting failures instead of stopping at the first one.
  pub(crate) fn finalize_all(&mut self) -> Vec<FinalizeFailure> {
    let mut failures = Vec::new();
    for component in self.components.iter_mut().rev() {
      if let Err(e) = component.finalize() {
        warn!(
          graph = %self.name,
          component = %component.name(),
          error = %e,
          "component failed to finalize"
        );
        failures.push(FinalizeFailure {
          component_id: component.id(),
          component: component.name().to_string(),
          cause: e.to_string(),
        });
      }
    }
    failures
  }

  fn ensure_mutable(&self) -> Result<(), GraphFrozenError> {
    if self.is_frozen() {
      return Err(GraphFrozenError {
        graph: self.name.clone(),
      });
    }
    Ok(())
  }

  fn resolve_port(
    &self,
    component: &str,
    port: &str,
    direction: PortDirection,
  ) -> Result<PortId, ConnectError> {
    let found = self.find_component(component).and_then(|c| match direction {
      PortDirection::Input => c.input_port(port),
      PortDirection::Output => c.output_port(port),
    });
    found.ok_or_else(|| ConnectError::UnknownPort {
      component: component.to_string(),
      port: port.to_string(),
    })
  }

  fn upstream_of(
    &self,
    component: &Component,
    port: &PortInfo,
  ) -> Result<ComponentId, ValidationError> {
    port
      .connection
      .and_then(|c| self.connections.get(c.0))
      .map(|c| c.upstream.component)
      .ok_or_else(|| ValidationError::UnconnectedInput {
        component: component.name().to_string(),
        port: port.name.clone(),
      })
  }

  /// Depth-first walk upstream; returns whether `id` is fed by a source.
  fn visit(&self, id: ComponentId, marks: &mut [Mark]) -> Result<bool, ValidationError> {
    let component = &self.components[id.0];
    match marks[id.0] {
      Mark::Done(fed) => return Ok(fed),
      Mark::Visiting => {
        return Err(ValidationError::Cycle {
          component: component.name().to_string(),
        })
      }
      Mark::Unvisited => {}
    }
    marks[id.0] = Mark::Visiting;
    let fed = match component.kind() {
      ComponentKind::Source => true,
      ComponentKind::Sink => false,
      ComponentKind::Filter => {
        let mut fed = false;
        for port in component.ports().filter(|p| p.is_input()) {
          let upstream = self.upstream_of(component, &port)?;
          fed |= self.visit(upstream, marks)?;
        }
        fed
      }
    };
    marks[id.0] = Mark::Done(fed);
    Ok(fed)
  }
}

fn unknown_port(port: PortId) -> ConnectError {
  ConnectError::UnknownPort {
    component: port.component.to_string(),
    port: port.index.to_string(),
  }
}

#[derive(Clone, Copy)]
enum Mark {
  Unvisited,
  Visiting,
  Done(bool),
}

impl fmt::Debug for Graph {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Graph")
      .field("id", &self.id)
      .field("name", &self.name)
      .field("state", &self.state)
      .field("components", &self.components)
      .field("connections", &self.connections)
      .finish()
  }
}

impl Drop for Graph {
  fn drop(&mut self) {
    // Failures are already logged by finalize_all.
    let _ = self.finalize_all();
  }
}
