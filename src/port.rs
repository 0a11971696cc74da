//! # Ports and Connections
//!
//! Ports are created from a component's class schema when the component is
//! added to a graph. Each port belongs to exactly one component and holds at most
//! one [`Connection`].
//!
//! Callers refer to ports through copyable [`PortId`] handles and read them
//! through [`PortInfo`] snapshots; mutable access stays inside the graph.
//!
//! A connection is owned by the graph. Each endpoint only records the
//! connection's id, so either side finds its peer in constant time without
//! owning it.

use crate::class::PortDirection;
use crate::component::ComponentId;
use crate::graph::GraphId;

/// Handle of a port: graph, owning component, position in the schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PortId {
  pub(crate) graph: GraphId,
  pub(crate) component: ComponentId,
  pub(crate) index: usize,
  pub(crate) direction: PortDirection,
}

impl PortId {
  /// Graph owning the port.
  pub fn graph(&self) -> GraphId {
    self.graph
  }

  /// Component owning the port.
  pub fn component(&self) -> ComponentId {
    self.component
  }

  /// Port direction.
  pub fn direction(&self) -> PortDirection {
    self.direction
  }

  /// Whether this is an input port.
  pub fn is_input(&self) -> bool {
    self.direction == PortDirection::Input
  }

  /// Whether this is an output port.
  pub fn is_output(&self) -> bool {
    self.direction == PortDirection::Output
  }
}

/// Id of a connection within its graph, in creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub(crate) usize);

/// A link from one output port to one input port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Connection {
  pub(crate) id: ConnectionId,
  pub(crate) upstream: PortId,
  pub(crate) downstream: PortId,
}

impl Connection {
  /// Id of the connection.
  pub fn id(&self) -> ConnectionId {
    self.id
  }

  /// The output port.
  pub fn upstream(&self) -> PortId {
    self.upstream
  }

  /// The input port.
  pub fn downstream(&self) -> PortId {
    self.downstream
  }

  /// Returns the endpoint opposite to `port`, or `None` if `port` is not an
  /// endpoint of this connection.
  pub fn peer_of(&self, port: PortId) -> Option<PortId> {
    if port == self.upstream {
      Some(self.downstream)
    } else if port == self.downstream {
      Some(self.upstream)
    } else {
      None
    }
  }
}

/// Read-only snapshot of a port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortInfo {
  /// Handle of the port.
  pub id: PortId,
  /// Port name.
  pub name: String,
  /// Port direction.
  pub direction: PortDirection,
  /// Owning component.
  pub component: ComponentId,
  /// Connection held by the port, if any.
  pub connection: Option<ConnectionId>,
  /// Whether an input port has reached end of stream.
  pub at_end: bool,
}

impl PortInfo {
  /// Whether this is an input port.
  pub fn is_input(&self) -> bool {
    self.direction == PortDirection::Input
  }

  /// Whether this is an output port.
  pub fn is_output(&self) -> bool {
    self.direction == PortDirection::Output
  }

  /// Whether the port holds a connection.
  pub fn is_connected(&self) -> bool {
    self.connection.is_some()
  }
}

#[derive(Debug)]
pub(crate) struct Port {
  pub(crate) name: String,
  pub(crate) direction: PortDirection,
  pub(crate) connection: Option<ConnectionId>,
  pub(crate) at_end: bool,
}

impl Port {
  pub(crate) fn new(name: String, direction: PortDirection) -> Self {
    Self {
      name,
      direction,
      connection: None,
      at_end: false,
    }
  }
}
