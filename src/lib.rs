//! # tracegraph
//!
//! Component graph runtime for trace processing.
//!
//! A trace-processing pipeline is a directed graph of components. **Sources**
//! produce messages, **filters** transform them and **sinks** consume them.
//! Components expose named input and output ports; connections link one output
//! port to one input port. A cooperative pull executor drives the graph: sinks
//! pull from their inputs, which pull recursively through filters down to
//! sources.
//!
//! ## Key Features
//!
//! - **Class registry**: register component classes by name, with validated
//!   port schemas and class queries
//! - **Graph building**: add components, connect ports, validate the topology
//! - **Pull execution**: round-based scheduling with backpressure, cancellation
//!   and ordered finalization
//! - **Built-in components**: counter and vector sources, pass-through and
//!   closure filters, discard and collecting sinks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tracegraph::components::{CollectSink, FnFilter};
//! use tracegraph::graph::Graph;
//! use tracegraph::registry::Registry;
//! use tracegraph::value::parse_config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::with_builtins();
//! let counter = registry.lookup("source.counter").ok_or("missing class")?;
//! let even = FnFilter::class("filter.even", |m| {
//!   Ok(m.downcast_ref::<i64>().filter(|v| *v % 2 == 0).map(|_| m.clone()))
//! });
//! let (sink, collected) = CollectSink::class("sink.collect");
//!
//! let mut graph = Graph::new("evens");
//! graph.add_component(counter, "numbers", &parse_config(r#"{"count": 10}"#)?)?;
//! graph.add_component(Arc::new(even), "even", &Default::default())?;
//! graph.add_component(Arc::new(sink), "out", &Default::default())?;
//! graph.connect_by_name("numbers", "out", "even", "in")?;
//! graph.connect_by_name("even", "out", "out", "in")?;
//!
//! graph.run().await?;
//! assert_eq!(collected.values::<i64>().await, vec![0, 2, 4, 6, 8]);
//! # Ok(())
//! # }
//! ```

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// Component classes, kinds and port schemas.
pub mod class;
/// Component behavior traits and component instances.
pub mod component;
/// Built-in component implementations.
pub mod components;
/// Executor configuration.
pub mod config;
/// Error types.
pub mod error;
/// Pull-model graph executor.
pub mod executor;
/// Graph structure: components and connections.
pub mod graph;
/// Tracing subscriber setup.
pub mod logging;
/// Ports and connections.
pub mod port;
/// Component class queries.
pub mod query;
/// Component class registry.
pub mod registry;
/// Configuration values.
pub mod value;
/// Library version.
pub mod version;

pub use class::{ComponentClass, ComponentKind, PortDirection};
pub use component::{Filter, Lifecycle, Message, Pull, Sink, Source};
pub use executor::Upstream;
pub use graph::Graph;
pub use registry::Registry;
pub use version::version;

#[cfg(test)]
mod registry_test;
#[cfg(test)]
mod test_support;
