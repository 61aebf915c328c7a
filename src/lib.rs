//! model-registry: configuration-driven model and datasource registry
//!
//! Discovers datasource and model configuration under a project directory,
//! merges environment overrides, builds models through an ORM runtime and
//! drives the connect / attach / boot lifecycle.
//!
//! ```no_run
//! use model_registry::{MemoryOrm, Registry, RegistryOptions};
//! use std::sync::Arc;
//!
//! let mut registry = Registry::new(Arc::new(MemoryOrm::new()), RegistryOptions::new().dir("app"))?;
//! let models = registry.connect()?;
//! println!("{} models attached", models.len());
//! registry.disconnect()?;
//! # Ok::<(), model_registry::RegistryError>(())
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod lifecycle;
pub mod orm;
pub mod registry;
pub mod script;
pub mod utils;

pub use discovery::{ModelDefinition, DEFAULT_DATA_SOURCE};
pub use error::{RegistryError, Result};
pub use lifecycle::{ModelHooks, Phase};
pub use orm::{
    DataSource, MemoryOrm, MixinFn, ModelBuilder, ModelClass, ModelMap, ModelRef, ModelSchema, Orm,
    OrmError,
};
pub use registry::{Registry, RegistryOptions, DEFAULT_ENV, ENV_VAR};
pub use script::{ModelScript, ScriptLoader, ScriptTable};
