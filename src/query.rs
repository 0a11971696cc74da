//! Component class queries.
//!
//! External tooling asks a class about itself without instantiating a
//! component. The core answers the [`SCHEMA_QUERY`] for every class; any other
//! query name goes to the handler installed with
//! [`ComponentClass::with_query_handler`].
//!
//! The `schema` result is a map:
//!
//! ```text
//! { "name": "...", "kind": "source" | "filter" | "sink",
//!   "description": "...", "help": "...",          (when set)
//!   "inputs":  { "<port>": <position>, ... },
//!   "outputs": { "<port>": <position>, ... } }
//! ```

use crate::class::{ComponentClass, PortDirection};
use crate::error::QueryError;
use crate::value::{ConfigMap, Value};
use tracing::trace;

/// Result of a query.
pub type QueryResult = Value;

/// Name of the built-in query describing a class's kind and port schema.
pub const SCHEMA_QUERY: &str = "schema";

/// Runs query `query_name` with `params` against `class`.
pub fn query(
  class: &ComponentClass,
  query_name: &str,
  params: &ConfigMap,
) -> Result<QueryResult, QueryError> {
  trace!("query(class={}, query={})", class.name(), query_name);
  if query_name == SCHEMA_QUERY {
    if !params.is_empty() {
      return Err(QueryError::InvalidParams {
        query: query_name.to_string(),
        reason: "the schema query takes no parameters".to_string(),
      });
    }
    return Ok(schema(class));
  }
  match class.query_handler() {
    Some(handler) => handler(query_name, params),
    None => Err(QueryError::UnknownQuery {
      class: class.name().to_string(),
      query: query_name.to_string(),
    }),
  }
}

fn schema(class: &ComponentClass) -> Value {
  let mut map = ConfigMap::new();
  map.insert("name".to_string(), Value::from(class.name()));
  map.insert("kind".to_string(), Value::from(class.kind().as_str()));
  if let Some(description) = class.description() {
    map.insert("description".to_string(), Value::from(description));
  }
  if let Some(help) = class.help() {
    map.insert("help".to_string(), Value::from(help));
  }
  for (key, direction) in [("inputs", PortDirection::Input), ("outputs", PortDirection::Output)] {
    let ports = class
      .ports_in(direction)
      .enumerate()
      .map(|(position, port)| (port.name.clone(), Value::Integer(position as i64)))
      .collect::<ConfigMap>();
    map.insert(key.to_string(), Value::Map(ports));
  }
  Value::Map(map)
}
