//! # Registry Test Suite
//!
//! Tests for class registration, lookup, queries and the process-wide
//! registry.

use crate::class::ComponentClass;
use crate::components::{DiscardSink, PassthroughFilter};
use crate::error::{DuplicateClassError, QueryError, RegistryError, SchemaError};
use crate::query::SCHEMA_QUERY;
use crate::registry::{self, Registry};
use crate::value::{ConfigMap, Value};

fn discard(name: &str, description: &str) -> ComponentClass {
  ComponentClass::sink(name, DiscardSink::default)
    .with_input("in")
    .with_description(description)
}

#[test]
fn test_duplicate_class_keeps_the_first() {
  let mut registry = Registry::new();
  registry.register(discard("sink.x", "first")).unwrap();

  let err = registry.register(discard("sink.x", "second")).unwrap_err();

  assert_eq!(
    err,
    RegistryError::Duplicate(DuplicateClassError {
      name: "sink.x".to_string()
    })
  );
  assert_eq!(registry.len(), 1);
  assert_eq!(
    registry.lookup("sink.x").unwrap().description(),
    Some("first")
  );
}

#[test]
fn test_malformed_schema_is_not_registered() {
  let mut registry = Registry::new();
  let class = ComponentClass::sink("sink.bad", DiscardSink::default).with_output("out");

  let err = registry.register(class).unwrap_err();

  assert!(matches!(
    err,
    RegistryError::Schema(SchemaError::DirectionNotAllowed { .. })
  ));
  assert!(registry.is_empty());
  assert!(registry.lookup("sink.bad").is_none());
}

#[test]
fn test_classes_keep_registration_order() {
  let mut registry = Registry::new();
  for name in ["c", "a", "b"] {
    registry.register(discard(name, "")).unwrap();
  }

  let names: Vec<&str> = registry.classes().map(|c| c.name()).collect();
  assert_eq!(names, vec!["c", "a", "b"]);
}

#[test]
fn test_builtins_are_registered() {
  let registry = Registry::with_builtins();

  assert_eq!(registry.len(), 3);
  assert!(registry.lookup("source.counter").unwrap().is_source());
  assert!(registry.lookup("filter.passthrough").unwrap().is_filter());
  assert!(registry.lookup("sink.discard").unwrap().is_sink());
}

#[test]
fn test_schema_query() {
  let mut registry = Registry::new();
  registry
    .register(
      ComponentClass::filter("filter.mux", PassthroughFilter::default)
        .with_input("a")
        .with_input("b")
        .with_output("out")
        .with_help("mux help"),
    )
    .unwrap();

  let result = registry
    .query("filter.mux", SCHEMA_QUERY, &ConfigMap::new())
    .unwrap();

  let map = result.as_map().unwrap();
  assert_eq!(map["name"], Value::from("filter.mux"));
  assert_eq!(map["kind"], Value::from("filter"));
  assert_eq!(map["help"], Value::from("mux help"));
  assert!(!map.contains_key("description"));
  let inputs = map["inputs"].as_map().unwrap();
  assert_eq!(inputs["a"], Value::Integer(0));
  assert_eq!(inputs["b"], Value::Integer(1));
  assert_eq!(map["outputs"].as_map().unwrap().len(), 1);
}

#[test]
fn test_schema_query_takes_no_parameters() {
  let registry = Registry::with_builtins();
  let mut params = ConfigMap::new();
  params.insert("verbose".to_string(), Value::Bool(true));

  assert!(matches!(
    registry.query("sink.discard", SCHEMA_QUERY, &params),
    Err(QueryError::InvalidParams { .. })
  ));
}

#[test]
fn test_query_errors() {
  let registry = Registry::with_builtins();

  assert_eq!(
    registry.query("no.such.class", SCHEMA_QUERY, &ConfigMap::new()),
    Err(QueryError::UnknownClass("no.such.class".to_string()))
  );
  assert_eq!(
    registry.query("sink.discard", "support-info", &ConfigMap::new()),
    Err(QueryError::UnknownQuery {
      class: "sink.discard".to_string(),
      query: "support-info".to_string(),
    })
  );
}

#[test]
fn test_query_handler_receives_other_queries() {
  let mut registry = Registry::new();
  let class = discard("sink.q", "").with_query_handler(|name, params| match name {
    "echo" => Ok(Value::Map(params.clone())),
    _ => Err(QueryError::Failed {
      class: "sink.q".to_string(),
      query: name.to_string(),
      reason: "unsupported".to_string(),
    }),
  });
  registry.register(class).unwrap();
  let mut params = ConfigMap::new();
  params.insert("path".to_string(), Value::from("/tmp/trace"));

  assert_eq!(
    registry.query("sink.q", "echo", &params),
    Ok(Value::Map(params.clone()))
  );
  assert!(matches!(
    registry.query("sink.q", "other", &params),
    Err(QueryError::Failed { .. })
  ));
  // the schema query never reaches the handler
  assert!(registry.query("sink.q", SCHEMA_QUERY, &ConfigMap::new()).is_ok());
}

#[test]
fn test_install_and_teardown_process_wide_registry() {
  // The only test touching the process-wide registry.
  assert!(registry::installed().is_none());

  let installed = registry::install(Registry::with_builtins()).unwrap();
  assert!(installed.lookup("source.counter").is_some());
  assert_eq!(registry::installed().unwrap().len(), installed.len());
  assert_eq!(
    registry::install(Registry::new()).unwrap_err(),
    RegistryError::AlreadyInstalled
  );

  let removed = registry::teardown().unwrap();
  assert_eq!(removed.len(), 3);
  assert!(registry::installed().is_none());
  assert!(registry::teardown().is_none());
  // handles obtained before teardown stay usable
  assert!(installed.lookup("sink.discard").is_some());
}
