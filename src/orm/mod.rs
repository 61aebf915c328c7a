//! Interfaces of the external model-builder / ORM runtime
//!
//! The registry never builds schemas or talks to a backend itself. It drives
//! these traits, and [`memory`] provides an in-process implementation used by
//! the CLI and the test suite.

use crate::lifecycle::Phase;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

pub mod memory;

pub use memory::{MemoryDataSource, MemoryModel, MemoryModelBuilder, MemoryOrm};

/// A live model class produced by a [`ModelBuilder`].
pub type ModelRef = Arc<dyn ModelClass>;

/// Live model classes keyed by model name.
pub type ModelMap = BTreeMap<String, ModelRef>;

/// A mixin: called with the model class and the options it was applied with.
pub type MixinFn = Arc<dyn Fn(&dyn ModelClass, &Value) + Send + Sync>;

/// An operation observer (e.g. `before save`) receiving the mutable payload.
pub type OperationHook = Arc<dyn Fn(&mut Value) + Send + Sync>;

/// Errors reported by ORM collaborators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrmError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("unknown mixin: {0}")]
    UnknownMixin(String),

    #[error("invalid schema for {model}: {reason}")]
    InvalidSchema { model: String, reason: String },
}

/// Schema handed to [`ModelBuilder::build_models`].
///
/// `options` holds the schema file's own `options` object plus every
/// non-reserved top-level key of the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub name: String,
    #[serde(default = "empty_object")]
    pub properties: Value,
    #[serde(default)]
    pub options: Map<String, Value>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl ModelSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), properties: empty_object(), options: Map::new() }
    }
}

/// The mixin table hosted by a model-builder.
///
/// Clones share the same table, so model classes can keep a handle to the
/// builder's mixins and resolve names registered after they were built.
#[derive(Clone, Default)]
pub struct MixinRegistry {
    table: Arc<RwLock<BTreeMap<String, MixinFn>>>,
}

impl MixinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `mixin` under `name`, replacing any earlier registration.
    pub fn define(&self, name: impl Into<String>, mixin: MixinFn) {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        table.insert(name.into(), mixin);
    }

    pub fn get(&self, name: &str) -> Option<MixinFn> {
        self.table.read().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.read().unwrap_or_else(PoisonError::into_inner).contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.table.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.table.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for MixinRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixinRegistry").field("names", &self.names()).finish()
    }
}

/// A model class built from a [`ModelSchema`].
pub trait ModelClass: Send + Sync + fmt::Debug {
    fn model_name(&self) -> &str;

    /// Add (or replace) a property definition.
    fn define_property(&self, name: &str, spec: Value);

    /// Apply a mixin registered with the owning builder's [`MixinRegistry`].
    fn mixin(&self, name: &str, options: &Value) -> Result<(), OrmError>;

    /// Observe a persistence operation such as `before save`.
    fn observe(&self, operation: &str, hook: OperationHook);

    /// Internal lifecycle hook, invoked before registry subscribers of `phase`.
    fn notify(&self, phase: Phase) {
        let _ = phase;
    }

    fn as_any(&self) -> &dyn Any;
}

/// Compiles schemas into model classes and hosts the mixin table.
pub trait ModelBuilder: Send + Sync + fmt::Debug {
    fn mixins(&self) -> &MixinRegistry;

    /// Build every schema of the batch, keyed by model name.
    fn build_models(&self, schemas: &[ModelSchema]) -> Result<ModelMap, OrmError>;
}

/// A named connection to a persistence backend.
pub trait DataSource: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// The merged configuration this datasource was created with.
    fn settings(&self) -> &Value;

    fn model_builder(&self) -> Arc<dyn ModelBuilder>;

    fn connect(&self) -> Result<(), OrmError>;

    fn disconnect(&self) -> Result<(), OrmError>;

    fn attach(&self, model: &ModelRef);

    fn automigrate(&self) -> Result<(), OrmError>;

    fn as_any(&self) -> &dyn Any;
}

/// Entry point of an ORM runtime: the builder and datasource factory.
pub trait Orm: Send + Sync {
    fn model_builder(&self) -> Arc<dyn ModelBuilder>;

    fn create_data_source(
        &self,
        name: &str,
        settings: &Value,
        builder: Arc<dyn ModelBuilder>,
    ) -> Arc<dyn DataSource>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixin_registry_clones_share_the_table() {
        let registry = MixinRegistry::new();
        let handle = registry.clone();
        registry.define("TimeStamp", Arc::new(|_: &dyn ModelClass, _: &Value| {}));

        assert!(handle.contains("TimeStamp"));
        assert_eq!(handle.names(), vec!["TimeStamp".to_string()]);
        assert!(!handle.is_empty());
    }

    #[test]
    fn schema_deserializes_with_defaults() {
        let schema: ModelSchema = serde_json::from_str(r#"{"name":"Author"}"#).expect("schema");
        assert_eq!(schema, ModelSchema::new("Author"));
    }
}
