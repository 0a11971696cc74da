//! # Error Types
//!
//! Every fallible operation of the graph runtime reports a dedicated error type.
//!
//! ## Propagation Policy
//!
//! - **Structural errors** ([`SchemaError`], [`DuplicateClassError`],
//!   [`ConnectError`], [`AddComponentError`], [`GraphFrozenError`]) are returned
//!   synchronously by the call that caused them. The registry or graph is left
//!   exactly as it was before the call.
//! - **Execution errors** ([`ExecutionError`]) halt the whole run. Before the
//!   error is returned, every live component is finalized in reverse creation
//!   order; finalization failures are attached to the error instead of replacing
//!   it.
//! - **Component errors** are type-erased as [`ComponentError`]; components may
//!   return any `std::error::Error`.

use crate::class::{ComponentKind, PortDirection};
use crate::component::ComponentId;
use crate::graph::GraphState;
use thiserror::Error;

/// Error type returned by component implementations.
pub type ComponentError = Box<dyn std::error::Error + Send + Sync>;

/// A port schema that violates the rules of its component kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
  /// The class name is empty.
  #[error("component class name must not be empty")]
  EmptyClassName,
  /// A port name is empty.
  #[error("class '{class}' declares a port with an empty name")]
  EmptyPortName {
    /// Offending class.
    class: String,
  },
  /// A port direction is not allowed for the class kind
  /// (an input on a source or an output on a sink).
  #[error("{kind} class '{class}' cannot declare {direction} port '{port}'")]
  DirectionNotAllowed {
    /// Offending class.
    class: String,
    /// Kind of the class.
    kind: ComponentKind,
    /// The rejected port.
    port: String,
    /// Direction of the rejected port.
    direction: PortDirection,
  },
  /// The same port name is declared twice for one direction.
  #[error("class '{class}' declares {direction} port '{port}' more than once")]
  DuplicatePort {
    /// Offending class.
    class: String,
    /// Duplicated port name.
    port: String,
    /// Direction of the duplicated port.
    direction: PortDirection,
  },
}

/// A component class with the same name is already registered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("component class '{name}' is already registered")]
pub struct DuplicateClassError {
  /// Name of the rejected class.
  pub name: String,
}

/// Error type for registry operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
  /// The class name is taken.
  #[error(transparent)]
  Duplicate(#[from] DuplicateClassError),
  /// The class schema is malformed.
  #[error(transparent)]
  Schema(#[from] SchemaError),
  /// A process-wide registry is already installed.
  #[error("a process-wide registry is already installed")]
  AlreadyInstalled,
}

/// A component's initialization routine failed.
#[derive(Error, Debug)]
#[error("failed to initialize component '{component}' of class '{class}': {cause}")]
pub struct InitError {
  /// Name the component was to be added under.
  pub component: String,
  /// Name of the component class.
  pub class: String,
  /// Error reported by the component.
  #[source]
  pub cause: ComponentError,
}

/// The graph topology is frozen because execution has started.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("graph '{graph}' is frozen: topology cannot change after execution starts")]
pub struct GraphFrozenError {
  /// Name of the frozen graph.
  pub graph: String,
}

/// Error type for adding a component to a graph.
#[derive(Error, Debug)]
pub enum AddComponentError {
  /// Execution already started.
  #[error(transparent)]
  Frozen(#[from] GraphFrozenError),
  /// The class schema is malformed.
  #[error(transparent)]
  Schema(#[from] SchemaError),
  /// The component rejected its configuration.
  #[error(transparent)]
  Init(#[from] InitError),
  /// Another component of the graph already uses this name.
  #[error("graph already contains a component named '{0}'")]
  DuplicateName(String),
}

/// Error type for connecting two ports.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
  /// One of the two ports already holds a connection.
  #[error("port '{port}' of component '{component}' is already connected")]
  AlreadyConnected {
    /// Component owning the connected port.
    component: String,
    /// Name of the connected port.
    port: String,
  },
  /// The ports are not one output followed by one input.
  #[error("expected an output port and an input port, got {upstream} and {downstream}")]
  DirectionMismatch {
    /// Direction of the first port.
    upstream: PortDirection,
    /// Direction of the second port.
    downstream: PortDirection,
  },
  /// The two ports belong to different graphs.
  #[error("ports belong to different graphs")]
  ForeignGraph,
  /// Both ports belong to the same component.
  #[error("component '{component}' cannot be connected to itself")]
  SelfLoop {
    /// The component.
    component: String,
  },
  /// A port handle or port name does not resolve in this graph.
  #[error("unknown port '{port}' on component '{component}'")]
  UnknownPort {
    /// Component name (or id when the component is unknown).
    component: String,
    /// Port name (or index).
    port: String,
  },
  /// Execution already started.
  #[error(transparent)]
  Frozen(#[from] GraphFrozenError),
}

/// The graph is not ready to run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
  /// The graph has no sink, so nothing would ever pull data.
  #[error("graph has no sink component")]
  NoSink,
  /// An input port that a sink depends on is not connected.
  #[error("input port '{port}' of component '{component}' is not connected")]
  UnconnectedInput {
    /// Component owning the port.
    component: String,
    /// The unconnected port.
    port: String,
  },
  /// A sink input port is not fed by any source.
  #[error("input port '{port}' of sink '{component}' is not reachable from any source")]
  Unreachable {
    /// The sink.
    component: String,
    /// The unreachable port.
    port: String,
  },
  /// The connections form a cycle through this component.
  #[error("connection cycle through component '{component}'")]
  Cycle {
    /// A component on the cycle.
    component: String,
  },
}

/// A component failed to finalize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeFailure {
  /// Id of the component.
  pub component_id: ComponentId,
  /// Name of the component.
  pub component: String,
  /// Rendered error message.
  pub cause: String,
}

impl std::fmt::Display for FinalizeFailure {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}: {}", self.component, self.cause)
  }
}

/// A component's processing step failed and halted the run.
#[derive(Error, Debug)]
#[error("component '{component}' failed: {cause}")]
pub struct ExecutionError {
  /// Id of the failing component.
  pub component_id: ComponentId,
  /// Name of the failing component.
  pub component: String,
  /// Error reported by the component.
  #[source]
  pub cause: ComponentError,
  /// Failures collected while finalizing the remaining components.
  pub finalize_failures: Vec<FinalizeFailure>,
}

/// One or more components failed to finalize during teardown.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} component(s) failed to finalize", .failures.len())]
pub struct TeardownError {
  /// Failures in finalization order.
  pub failures: Vec<FinalizeFailure>,
}

/// Error type for graph execution.
#[derive(Error, Debug)]
pub enum RunError {
  /// The graph failed validation at the first step; it stays unfrozen.
  #[error("graph validation failed: {0}")]
  Validation(#[from] ValidationError),
  /// A component halted the run.
  #[error(transparent)]
  Execution(#[from] ExecutionError),
  /// The backoff policy gave up waiting for data.
  #[error("run stalled after {idle_rounds} rounds without progress")]
  Stalled {
    /// Consecutive rounds in which every pull returned `Again`.
    idle_rounds: u32,
    /// Failures collected while finalizing components.
    finalize_failures: Vec<FinalizeFailure>,
  },
  /// The run completed but some components failed to finalize.
  #[error(transparent)]
  Finalize(#[from] TeardownError),
  /// The graph already finished, was cancelled or faulted.
  #[error("graph cannot run in state {0:?}")]
  NotRunnable(GraphState),
}

/// Error type for component class queries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
  /// No class with this name is registered.
  #[error("unknown component class '{0}'")]
  UnknownClass(String),
  /// The class does not answer this query.
  #[error("class '{class}' does not support query '{query}'")]
  UnknownQuery {
    /// Queried class.
    class: String,
    /// Requested query name.
    query: String,
  },
  /// The query parameters are invalid.
  #[error("invalid parameters for query '{query}': {reason}")]
  InvalidParams {
    /// Requested query name.
    query: String,
    /// What is wrong with the parameters.
    reason: String,
  },
  /// The class's query handler failed.
  #[error("query '{query}' on class '{class}' failed: {reason}")]
  Failed {
    /// Queried class.
    class: String,
    /// Requested query name.
    query: String,
    /// Failure description.
    reason: String,
  },
}
