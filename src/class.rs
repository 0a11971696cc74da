//! # Component Classes
//!
//! A [`ComponentClass`] describes one kind of component that can be placed in a
//! graph: its name, whether it is a source, a filter or a sink, the ports every
//! instance exposes, and a factory producing fresh instances.
//!
//! Classes are immutable once built. They are shared as `Arc<ComponentClass>`
//! between the [`Registry`](crate::registry::Registry) and every component
//! instantiated from them.
//!
//! ## Port Rules
//!
//! | Kind   | Input ports | Output ports |
//! |--------|-------------|--------------|
//! | Source | no          | yes          |
//! | Filter | yes         | yes          |
//! | Sink   | yes         | no           |
//!
//! Schemas violating these rules are rejected with a
//! [`SchemaError`] by [`ComponentClass::validate`], which both the registry and
//! the graph call before accepting a class.
//!
//! ## Example
//!
//! ```rust
//! use tracegraph::class::ComponentClass;
//! use tracegraph::components::PassthroughFilter;
//!
//! let class = ComponentClass::filter("filter.passthrough", PassthroughFilter::default)
//!   .with_input("in")
//!   .with_output("out")
//!   .with_description("Forwards every message unchanged");
//! assert!(class.is_filter());
//! assert!(class.validate().is_ok());
//! ```

use crate::component::{Behavior, Filter, Sink, Source};
use crate::error::{QueryError, SchemaError};
use crate::value::{ConfigMap, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// The three kinds of component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentKind {
  /// Produces messages; output ports only.
  Source,
  /// Transforms messages; input and output ports.
  Filter,
  /// Consumes messages; input ports only.
  Sink,
}

impl ComponentKind {
  /// Returns whether a component of this kind may declare a port in `direction`.
  pub fn allows(self, direction: PortDirection) -> bool {
    !matches!(
      (self, direction),
      (ComponentKind::Source, PortDirection::Input) | (ComponentKind::Sink, PortDirection::Output)
    )
  }

  /// Lower-case name of the kind.
  pub fn as_str(self) -> &'static str {
    match self {
      ComponentKind::Source => "source",
      ComponentKind::Filter => "filter",
      ComponentKind::Sink => "sink",
    }
  }
}

impl fmt::Display for ComponentKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Whether a port receives or emits messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PortDirection {
  /// Messages flow into the component.
  Input,
  /// Messages flow out of the component.
  Output,
}

impl PortDirection {
  /// Lower-case name of the direction.
  pub fn as_str(self) -> &'static str {
    match self {
      PortDirection::Input => "input",
      PortDirection::Output => "output",
    }
  }
}

impl fmt::Display for PortDirection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Declaration of one port in a class schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortDescriptor {
  /// Port name, unique per direction within the class.
  pub name: String,
  /// Port direction.
  pub direction: PortDirection,
}

impl PortDescriptor {
  /// Declares an input port.
  pub fn input(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      direction: PortDirection::Input,
    }
  }

  /// Declares an output port.
  pub fn output(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      direction: PortDirection::Output,
    }
  }
}

/// Factory producing a fresh component instance.
pub type ComponentFactory = Arc<dyn Fn() -> Behavior + Send + Sync>;

/// Class-specific query handler: `(query_name, params) -> result`.
pub type QueryHandler = Arc<dyn Fn(&str, &ConfigMap) -> Result<Value, QueryError> + Send + Sync>;

/// Descriptor of a kind of component.
#[derive(Clone)]
pub struct ComponentClass {
  name: String,
  kind: ComponentKind,
  description: Option<String>,
  help: Option<String>,
  ports: Vec<PortDescriptor>,
  factory: ComponentFactory,
  query_handler: Option<QueryHandler>,
}

impl ComponentClass {
  fn new(name: impl Into<String>, kind: ComponentKind, factory: ComponentFactory) -> Self {
    Self {
      name: name.into(),
      kind,
      description: None,
      help: None,
      ports: Vec::new(),
      factory,
      query_handler: None,
    }
  }

  /// Creates a source class whose instances are built by `factory`.
  pub fn source<F, S>(name: impl Into<String>, factory: F) -> Self
  where
    F: Fn() -> S + Send + Sync + 'static,
    S: Source + 'static,
  {
    Self::new(
      name,
      ComponentKind::Source,
      Arc::new(move || Behavior::Source(Box::new(factory()))),
    )
  }

  /// Creates a filter class whose instances are built by `factory`.
  pub fn filter<F, T>(name: impl Into<String>, factory: F) -> Self
  where
    F: Fn() -> T + Send + Sync + 'static,
    T: Filter + 'static,
  {
    Self::new(
      name,
      ComponentKind::Filter,
      Arc::new(move || Behavior::Filter(Box::new(factory()))),
    )
  }

  /// Creates a sink class whose instances are built by `factory`.
  pub fn sink<F, S>(name: impl Into<String>, factory: F) -> Self
  where
    F: Fn() -> S + Send + Sync + 'static,
    S: Sink + 'static,
  {
    Self::new(
      name,
      ComponentKind::Sink,
      Arc::new(move || Behavior::Sink(Box::new(factory()))),
    )
  }

  /// Declares an input port.
  pub fn with_input(mut self, name: impl Into<String>) -> Self {
    self.ports.push(PortDescriptor::input(name));
    self
  }

  /// Declares an output port.
  pub fn with_output(mut self, name: impl Into<String>) -> Self {
    self.ports.push(PortDescriptor::output(name));
    self
  }

  /// Sets the one-line description.
  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  /// Sets the help text.
  pub fn with_help(mut self, help: impl Into<String>) -> Self {
    self.help = Some(help.into());
    self
  }

  /// Installs the handler answering class-specific queries.
  ///
  /// The built-in `schema` query is answered by the core and never reaches the
  /// handler.
  pub fn with_query_handler<F>(mut self, handler: F) -> Self
  where
    F: Fn(&str, &ConfigMap) -> Result<Value, QueryError> + Send + Sync + 'static,
  {
    self.query_handler = Some(Arc::new(handler));
    self
  }

  /// Class name.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Class kind.
  pub fn kind(&self) -> ComponentKind {
    self.kind
  }

  /// Whether this is a source class.
  pub fn is_source(&self) -> bool {
    self.kind == ComponentKind::Source
  }

  /// Whether this is a filter class.
  pub fn is_filter(&self) -> bool {
    self.kind == ComponentKind::Filter
  }

  /// Whether this is a sink class.
  pub fn is_sink(&self) -> bool {
    self.kind == ComponentKind::Sink
  }

  /// Optional description.
  pub fn description(&self) -> Option<&str> {
    self.description.as_deref()
  }

  /// Optional help text.
  pub fn help(&self) -> Option<&str> {
    self.help.as_deref()
  }

  /// All declared ports, in declaration order.
  pub fn ports(&self) -> &[PortDescriptor] {
    &self.ports
  }

  /// Declared ports of one direction, in declaration order.
  pub fn ports_in(&self, direction: PortDirection) -> impl Iterator<Item = &PortDescriptor> {
    self.ports.iter().filter(move |p| p.direction == direction)
  }

  pub(crate) fn query_handler(&self) -> Option<&QueryHandler> {
    self.query_handler.as_ref()
  }

  pub(crate) fn instantiate(&self) -> Behavior {
    (self.factory)()
  }

  /// Checks the port schema against the rules of the class kind.
  pub fn validate(&self) -> Result<(), SchemaError> {
    if self.name.is_empty() {
      return Err(SchemaError::EmptyClassName);
    }
    let mut seen = HashSet::new();
    for port in &self.ports {
      if port.name.is_empty() {
        return Err(SchemaError::EmptyPortName {
          class: self.name.clone(),
        });
      }
      if !self.kind.allows(port.direction) {
        return Err(SchemaError::DirectionNotAllowed {
          class: self.name.clone(),
          kind: self.kind,
          port: port.name.clone(),
          direction: port.direction,
        });
      }
      if !seen.insert((port.direction, port.name.as_str())) {
        return Err(SchemaError::DuplicatePort {
          class: self.name.clone(),
          port: port.name.clone(),
          direction: port.direction,
        });
      }
    }
    Ok(())
  }
}

impl fmt::Debug for ComponentClass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ComponentClass")
      .field("name", &self.name)
      .field("kind", &self.kind)
      .field("ports", &self.ports)
      .field("has_query_handler", &self.query_handler.is_some())
      .finish()
  }
}
