//! # Component Class Registry
//!
//! The [`Registry`] maps class names to [`ComponentClass`] descriptors. It
//! rejects duplicate names and malformed port schemas, and answers queries on
//! behalf of its classes.
//!
//! ## Process-Wide Registry
//!
//! A registry is an ordinary value. A program that wants one shared registry
//! installs it explicitly once with [`install`], reads it with [`installed`] and
//! removes it with [`teardown`]. An installed registry is immutable: build it
//! completely before installing it.
//!
//! ```rust
//! use tracegraph::registry::{self, Registry};
//!
//! let shared = registry::install(Registry::with_builtins()).unwrap();
//! assert!(shared.lookup("source.counter").is_some());
//! assert!(registry::install(Registry::new()).is_err());
//! registry::teardown();
//! ```

use crate::class::ComponentClass;
use crate::components;
use crate::error::{DuplicateClassError, QueryError, RegistryError};
use crate::query;
use crate::value::{ConfigMap, Value};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, trace};

/// A set of component classes, keyed by name.
#[derive(Debug, Default)]
pub struct Registry {
  classes: HashMap<String, Arc<ComponentClass>>,
  order: Vec<String>,
}

impl Registry {
  /// Creates an empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// Creates a registry holding the built-in classes of
  /// [`crate::components`].
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    for class in components::builtin_classes() {
      // Built-in names are distinct and their schemas are valid.
      if let Err(e) = registry.register(class) {
        tracing::error!(error = %e, "failed to register built-in class");
      }
    }
    registry
  }

  /// Registers `class`.
  ///
  /// Fails with [`RegistryError::Schema`] if the port schema is malformed and
  /// with [`RegistryError::Duplicate`] if the name is taken; the registry keeps
  /// the class registered first.
  pub fn register(&mut self, class: ComponentClass) -> Result<(), RegistryError> {
    trace!("Registry::register(name={})", class.name());
    class.validate()?;
    if self.classes.contains_key(class.name()) {
      return Err(
        DuplicateClassError {
          name: class.name().to_string(),
        }
        .into(),
      );
    }
    let name = class.name().to_string();
    debug!(class = %name, kind = %class.kind(), "component class registered");
    self.order.push(name.clone());
    self.classes.insert(name, Arc::new(class));
    Ok(())
  }

  /// The class named `name`.
  pub fn lookup(&self, name: &str) -> Option<Arc<ComponentClass>> {
    self.classes.get(name).cloned()
  }

  /// All classes, in registration order.
  pub fn classes(&self) -> impl Iterator<Item = &ComponentClass> {
    self
      .order
      .iter()
      .filter_map(|name| self.classes.get(name).map(|c| c.as_ref()))
  }

  /// Number of registered classes.
  pub fn len(&self) -> usize {
    self.classes.len()
  }

  /// Whether no class is registered.
  pub fn is_empty(&self) -> bool {
    self.classes.is_empty()
  }

  /// Runs query `query_name` on the class named `class`.
  pub fn query(
    &self,
    class: &str,
    query_name: &str,
    params: &ConfigMap,
  ) -> Result<Value, QueryError> {
    let class = self
      .classes
      .get(class)
      .ok_or_else(|| QueryError::UnknownClass(class.to_string()))?;
    query::query(class, query_name, params)
  }
}

static INSTALLED: RwLock<Option<Arc<Registry>>> = RwLock::new(None);

/// Installs `registry` as the process-wide registry.
///
/// Fails with [`RegistryError::AlreadyInstalled`] if one is installed.
pub fn install(registry: Registry) -> Result<Arc<Registry>, RegistryError> {
  let mut slot = INSTALLED.write().unwrap_or_else(PoisonError::into_inner);
  if slot.is_some() {
    return Err(RegistryError::AlreadyInstalled);
  }
  let registry = Arc::new(registry);
  *slot = Some(Arc::clone(&registry));
  debug!(classes = registry.len(), "process-wide registry installed");
  Ok(registry)
}

/// The process-wide registry, if installed.
pub fn installed() -> Option<Arc<Registry>> {
  INSTALLED
    .read()
    .unwrap_or_else(PoisonError::into_inner)
    .clone()
}

/// Removes the process-wide registry and returns it.
///
/// Handles obtained earlier stay valid until dropped.
pub fn teardown() -> Option<Arc<Registry>> {
  let removed = INSTALLED
    .write()
    .unwrap_or_else(PoisonError::into_inner)
    .take();
  if removed.is_some() {
    debug!("process-wide registry torn down");
  }
  removed
}
