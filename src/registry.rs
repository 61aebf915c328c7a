//! The model/datasource registry
//!
//! Construction discovers and merges `datasources` and `model-config`, creates
//! the datasources, and loads model and mixin definitions. [`Registry::connect`]
//! then builds every active model, connects all datasources, and finalizes the
//! models in three passes: augmentation script, attach, lifecycle notification.

use crate::config;
use crate::discovery::{load_mixin_definitions, load_model_definitions, ModelDefinition};
use crate::error::{RegistryError, Result};
use crate::lifecycle::{Lifecycle, ModelHooks, Phase};
use crate::orm::{DataSource, ModelBuilder, ModelMap, ModelRef, ModelSchema, Orm, OrmError};
use crate::script::{ScriptLoader, ScriptTable};
use rayon::prelude::*;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::iter;
use std::path::PathBuf;
use std::sync::Arc;

/// Environment variable naming the active environment.
pub const ENV_VAR: &str = "MODEL_REGISTRY_ENV";

pub const DEFAULT_ENV: &str = "development";

const DATASOURCES_CONFIG: &str = "datasources";
const MODEL_CONFIG: &str = "model-config";

/// Construction options. Every field is optional.
#[derive(Default)]
pub struct RegistryOptions {
    /// Project root; defaults to the current working directory.
    pub dir: Option<PathBuf>,
    /// Defaults to `<dir>/config`.
    pub config_dir: Option<PathBuf>,
    /// Defaults to `<dir>/models`.
    pub models_dir: Option<PathBuf>,
    /// Defaults to `<dir>/mixins`.
    pub mixins_dir: Option<PathBuf>,
    /// Defaults to `$MODEL_REGISTRY_ENV`, then `development`.
    pub env: Option<String>,
    /// Datasource config merged underneath the discovered files.
    pub datasources: Map<String, Value>,
    /// Model config merged underneath the discovered files.
    pub models: Map<String, Value>,
    /// Resolves model, mixin and config scripts; defaults to an empty table.
    pub scripts: Option<Arc<dyn ScriptLoader>>,
}

impl RegistryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    pub fn models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = Some(dir.into());
        self
    }

    pub fn mixins_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.mixins_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    pub fn datasources(mut self, datasources: Map<String, Value>) -> Self {
        self.datasources = datasources;
        self
    }

    pub fn models(mut self, models: Map<String, Value>) -> Self {
        self.models = models;
        self
    }

    pub fn scripts(mut self, scripts: impl ScriptLoader + 'static) -> Self {
        self.scripts = Some(Arc::new(scripts));
        self
    }
}

impl fmt::Debug for RegistryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryOptions")
            .field("dir", &self.dir)
            .field("config_dir", &self.config_dir)
            .field("models_dir", &self.models_dir)
            .field("mixins_dir", &self.mixins_dir)
            .field("env", &self.env)
            .field("datasources", &self.datasources)
            .field("models", &self.models)
            .field("scripts", &self.scripts.is_some())
            .finish()
    }
}

pub struct Registry {
    orm: Arc<dyn Orm>,
    model_builder: Arc<dyn ModelBuilder>,
    scripts: Arc<dyn ScriptLoader>,
    env: String,
    data_sources: BTreeMap<String, Arc<dyn DataSource>>,
    model_config: Map<String, Value>,
    model_definitions: BTreeMap<String, ModelDefinition>,
    model_sources: Vec<PathBuf>,
    mixin_sources: Vec<PathBuf>,
    /// Subscriptions made by augmentation scripts; dropped on disconnect.
    model_hooks: Lifecycle,
    /// Subscriptions made through [`Registry::on`].
    listeners: Lifecycle,
    /// Present only while connected.
    models: Option<ModelMap>,
}

impl Registry {
    /// Discover configuration and definitions; no datasource is connected yet.
    pub fn new(orm: Arc<dyn Orm>, options: RegistryOptions) -> Result<Self> {
        let root = match options.dir {
            Some(dir) => dir,
            None => std::env::current_dir().map_err(|e| RegistryError::io(".", e))?,
        };
        let config_dir = options.config_dir.unwrap_or_else(|| root.join("config"));
        let models_dir = options.models_dir.unwrap_or_else(|| root.join("models"));
        let mixins_dir = options.mixins_dir.unwrap_or_else(|| root.join("mixins"));
        let env = options
            .env
            .or_else(|| std::env::var(ENV_VAR).ok().filter(|env| !env.is_empty()))
            .unwrap_or_else(|| DEFAULT_ENV.to_string());
        let scripts = options.scripts.unwrap_or_else(|| Arc::new(ScriptTable::new()));

        let (datasource_config, _) = config::load_merged(
            &config_dir,
            &env,
            DATASOURCES_CONFIG,
            options.datasources,
            scripts.as_ref(),
        )?;
        let (model_config, extra) =
            config::load_merged(&config_dir, &env, MODEL_CONFIG, options.models, scripts.as_ref())?;

        let model_sources: Vec<PathBuf> = iter::once(models_dir).chain(extra.models).collect();
        let mixin_sources: Vec<PathBuf> = iter::once(mixins_dir).chain(extra.mixins).collect();

        let model_builder = orm.model_builder();
        let mut registry = Self {
            orm,
            model_builder,
            scripts,
            env,
            data_sources: BTreeMap::new(),
            model_config,
            model_definitions: BTreeMap::new(),
            model_sources,
            mixin_sources,
            model_hooks: Lifecycle::new(),
            listeners: Lifecycle::new(),
            models: None,
        };

        for (name, settings) in datasource_config {
            let settings = match settings {
                Value::Null => Value::Object(Map::new()),
                other => other,
            };
            let key = settings.get("name").and_then(Value::as_str).unwrap_or(&name).to_string();
            let data_source = registry.create_data_source(&name, &settings);
            registry.data_sources.insert(key, data_source);
        }

        registry.model_definitions =
            load_model_definitions(&registry.model_sources, &registry.model_config)?;
        let mixin_count = load_mixin_definitions(
            &registry.mixin_sources,
            registry.model_builder.mixins(),
            registry.scripts.as_ref(),
        );

        tracing::info!(
            "Registry ready (env: {}, datasources: {}, models: {}, mixins: {})",
            registry.env,
            registry.data_sources.len(),
            registry.model_definitions.len(),
            mixin_count
        );
        Ok(registry)
    }

    /// Build, connect and finalize every active model.
    ///
    /// Calling this while connected returns the existing models untouched.
    /// Datasource connect failures do not stop the other datasources or the
    /// finalization passes: the models stay connected and reachable through
    /// [`Registry::models`], and the failures are returned as
    /// [`RegistryError::DataSources`].
    pub fn connect(&mut self) -> Result<ModelMap> {
        if let Some(models) = &self.models {
            return Ok(models.clone());
        }
        if self.data_sources.is_empty() {
            return Err(RegistryError::NoDataSources);
        }
        if self.model_config.is_empty() {
            return Err(RegistryError::NoModels);
        }

        let models = self.define_models()?;
        let connected = self.fan_out("connect", self.all_data_sources(), |ds| ds.connect());
        self.models = Some(models.clone());

        for model in models.values() {
            self.apply_source_file(model);
        }
        for model in models.values() {
            self.attach_model(model);
        }
        for model in models.values() {
            self.finalize_model(model);
        }

        tracing::info!("Connected {} models", models.len());
        connected.map(|()| models)
    }

    /// Disconnect every datasource and clear the connected models.
    ///
    /// The models are cleared even when a datasource fails to disconnect.
    pub fn disconnect(&mut self) -> Result<Option<ModelMap>> {
        let disconnected = self.fan_out("disconnect", self.all_data_sources(), |ds| ds.disconnect());
        let models = self.models.take();
        self.model_hooks = Lifecycle::new();
        disconnected.map(|()| models)
    }

    /// Run `automigrate` on the named datasources, or on all of them when
    /// `names` is empty.
    pub fn automigrate(&self, names: &[&str]) -> Result<()> {
        let targets = if names.is_empty() {
            self.all_data_sources()
        } else {
            names
                .iter()
                .filter_map(|name| match self.data_sources.get(*name) {
                    Some(ds) => Some(((*name).to_string(), Arc::clone(ds))),
                    None => {
                        tracing::warn!("Invalid DataSource: {}", name);
                        None
                    }
                })
                .collect()
        };
        self.fan_out("automigrate", targets, |ds| ds.automigrate())
    }

    /// Create a datasource and register it under `name`.
    pub fn setup_data_source(&mut self, name: &str, settings: Value) -> Arc<dyn DataSource> {
        let data_source = self.create_data_source(name, &settings);
        self.data_sources.insert(name.to_string(), Arc::clone(&data_source));
        data_source
    }

    /// Create a datasource sharing this registry's model-builder, without
    /// registering it.
    pub fn create_data_source(&self, name: &str, settings: &Value) -> Arc<dyn DataSource> {
        self.orm.create_data_source(name, settings, Arc::clone(&self.model_builder))
    }

    /// Run `handler` when model `model` reaches `phase`, on every connect.
    pub fn on<F>(&mut self, model: &str, phase: Phase, handler: F)
    where
        F: Fn(&ModelRef, &Registry) + Send + Sync + 'static,
    {
        self.listeners.subscribe(model, phase, Box::new(handler));
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    pub fn model_builder(&self) -> &Arc<dyn ModelBuilder> {
        &self.model_builder
    }

    pub fn data_source(&self, name: &str) -> Option<&Arc<dyn DataSource>> {
        self.data_sources.get(name)
    }

    pub fn data_sources(&self) -> &BTreeMap<String, Arc<dyn DataSource>> {
        &self.data_sources
    }

    pub fn model_config(&self) -> &Map<String, Value> {
        &self.model_config
    }

    /// Active definitions keyed by model name.
    pub fn model_definitions(&self) -> &BTreeMap<String, ModelDefinition> {
        &self.model_definitions
    }

    /// Model source directories in scan order (default directory first).
    pub fn model_sources(&self) -> &[PathBuf] {
        &self.model_sources
    }

    /// Mixin source directories in scan order (default directory first).
    pub fn mixin_sources(&self) -> &[PathBuf] {
        &self.mixin_sources
    }

    pub fn models(&self) -> Option<&ModelMap> {
        self.models.as_ref()
    }

    pub fn model(&self, name: &str) -> Option<&ModelRef> {
        self.models.as_ref().and_then(|models| models.get(name))
    }

    pub fn is_connected(&self) -> bool {
        self.models.is_some()
    }

    /// Build each datasource's models in one batch.
    fn define_models(&self) -> Result<ModelMap> {
        let mut groups: BTreeMap<&str, Vec<ModelSchema>> = BTreeMap::new();
        for definition in self.model_definitions.values() {
            groups.entry(definition.data_source()).or_default().push(definition.definition.clone());
        }

        let mut models = ModelMap::new();
        for (name, schemas) in groups {
            let builder = match self.data_sources.get(name) {
                Some(ds) => ds.model_builder(),
                None => Arc::clone(&self.model_builder),
            };
            models.extend(builder.build_models(&schemas)?);
        }
        Ok(models)
    }

    fn all_data_sources(&self) -> Vec<(String, Arc<dyn DataSource>)> {
        self.data_sources.iter().map(|(name, ds)| (name.clone(), Arc::clone(ds))).collect()
    }

    /// Run `op` on every target concurrently and wait for all of them.
    fn fan_out<F>(
        &self,
        operation: &'static str,
        targets: Vec<(String, Arc<dyn DataSource>)>,
        op: F,
    ) -> Result<()>
    where
        F: Fn(&dyn DataSource) -> std::result::Result<(), OrmError> + Sync + Send,
    {
        let failures: Vec<(String, OrmError)> = targets
            .into_par_iter()
            .filter_map(|(name, ds)| op(ds.as_ref()).err().map(|e| (name, e)))
            .collect();

        if failures.is_empty() {
            return Ok(());
        }
        for (name, e) in &failures {
            tracing::warn!("DataSource {} failed to {}: {}", name, operation, e);
        }
        Err(RegistryError::DataSources { operation, failures })
    }

    /// Pass one: run the model's augmentation script, if it is still on disk
    /// and resolvable.
    fn apply_source_file(&mut self, model: &ModelRef) {
        let Some(definition) = self.model_definitions.get(model.model_name()) else {
            return;
        };
        let Some(path) = definition.source_file.as_deref() else {
            return;
        };
        if !path.exists() {
            tracing::debug!("Augmentation script {} no longer exists", path.display());
            return;
        }
        let Some(script) = self.scripts.model_script(path) else {
            tracing::debug!("No script registered for {}", path.display());
            return;
        };
        let mut hooks = ModelHooks::new(model.model_name(), &mut self.model_hooks);
        script(model, &mut hooks);
    }

    /// Pass two: attach the model to its datasource.
    fn attach_model(&self, model: &ModelRef) {
        let Some(definition) = self.model_definitions.get(model.model_name()) else {
            return;
        };
        let name = definition.data_source();
        match self.data_sources.get(name) {
            Some(ds) => ds.attach(model),
            None => tracing::warn!("Invalid DataSource: {}", name),
        }
    }

    /// Pass three: notify `attached`, then `boot`.
    fn finalize_model(&self, model: &ModelRef) {
        let name = model.model_name();
        for phase in Phase::ORDER {
            model.notify(phase);
            for handler in self.model_hooks.handlers(name, phase) {
                handler(model, self);
            }
            for handler in self.listeners.handlers(name, phase) {
                handler(model, self);
            }
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("env", &self.env)
            .field("data_sources", &self.data_sources.keys().collect::<Vec<_>>())
            .field("model_definitions", &self.model_definitions.keys().collect::<Vec<_>>())
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::MemoryOrm;
    use serde_json::json;
    use tempfile::TempDir;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    fn empty_project() -> TempDir {
        TempDir::new().expect("tmp")
    }

    #[test]
    fn connect_requires_datasources() {
        let tmp = empty_project();
        let mut registry = Registry::new(
            Arc::new(MemoryOrm::new()),
            RegistryOptions::new().dir(tmp.path()).models(object(json!({"Author": {}}))),
        )
        .expect("registry");

        assert!(matches!(registry.connect(), Err(RegistryError::NoDataSources)));
        assert!(!registry.is_connected());
    }

    #[test]
    fn connect_requires_model_config() {
        let tmp = empty_project();
        let mut registry = Registry::new(
            Arc::new(MemoryOrm::new()),
            RegistryOptions::new().dir(tmp.path()).datasources(object(json!({"db": {}}))),
        )
        .expect("registry");

        assert!(matches!(registry.connect(), Err(RegistryError::NoModels)));
    }

    #[test]
    fn datasource_key_prefers_configured_name() {
        let tmp = empty_project();
        let registry = Registry::new(
            Arc::new(MemoryOrm::new()),
            RegistryOptions::new()
                .dir(tmp.path())
                .datasources(object(json!({"primary": {"name": "db"}, "cache": null}))),
        )
        .expect("registry");

        assert_eq!(registry.data_sources().keys().collect::<Vec<_>>(), vec!["cache", "db"]);
        assert_eq!(registry.data_source("db").map(|ds| ds.name()), Some("primary"));
        assert_eq!(registry.data_source("cache").map(|ds| ds.settings().clone()), Some(json!({})));
    }

    #[test]
    fn explicit_env_wins() {
        let tmp = empty_project();
        let registry = Registry::new(
            Arc::new(MemoryOrm::new()),
            RegistryOptions::new().dir(tmp.path()).env("staging"),
        )
        .expect("registry");
        assert_eq!(registry.env(), "staging");
    }

    #[test]
    fn setup_data_source_registers_it() {
        let tmp = empty_project();
        let mut registry =
            Registry::new(Arc::new(MemoryOrm::new()), RegistryOptions::new().dir(tmp.path()))
                .expect("registry");

        let ds = registry.setup_data_source("audit", json!({"connector": "memory"}));
        assert_eq!(ds.name(), "audit");
        assert!(registry.data_source("audit").is_some());

        let detached = registry.create_data_source("scratch", &json!({}));
        assert_eq!(detached.name(), "scratch");
        assert!(registry.data_source("scratch").is_none());
    }
}
