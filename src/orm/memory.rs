//! In-memory ORM runtime

use super::{
    DataSource, MixinRegistry, ModelBuilder, ModelClass, ModelMap, ModelRef, ModelSchema,
    OperationHook, Orm, OrmError,
};
use crate::lifecycle::Phase;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const CONNECTOR: &str = "memory";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// ORM runtime whose datasources keep everything in process.
///
/// Datasources configured with a `connector` other than `"memory"` are still
/// created, but fail to connect or migrate.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryOrm;

impl MemoryOrm {
    pub fn new() -> Self {
        Self
    }
}

impl Orm for MemoryOrm {
    fn model_builder(&self) -> Arc<dyn ModelBuilder> {
        Arc::new(MemoryModelBuilder::new())
    }

    fn create_data_source(
        &self,
        name: &str,
        settings: &Value,
        builder: Arc<dyn ModelBuilder>,
    ) -> Arc<dyn DataSource> {
        Arc::new(MemoryDataSource::new(name, settings.clone(), builder))
    }
}

#[derive(Debug, Default)]
pub struct MemoryModelBuilder {
    mixins: MixinRegistry,
}

impl MemoryModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the mixins declared in a schema's `options.mixins` object.
    fn apply_declared_mixins(model: &MemoryModel) {
        let Some(Value::Object(declared)) = model.settings.get("mixins").cloned() else {
            return;
        };
        for (name, options) in declared {
            let options = match options {
                Value::Null | Value::Bool(false) => continue,
                Value::Object(_) => options,
                _ => Value::Object(Map::new()),
            };
            if let Err(e) = model.mixin(&name, &options) {
                tracing::warn!("Model {} declares mixin {}: {}", model.name, name, e);
            }
        }
    }
}

impl ModelBuilder for MemoryModelBuilder {
    fn mixins(&self) -> &MixinRegistry {
        &self.mixins
    }

    fn build_models(&self, schemas: &[ModelSchema]) -> Result<ModelMap, OrmError> {
        let mut models = ModelMap::new();
        for schema in schemas {
            if schema.name.trim().is_empty() {
                return Err(OrmError::InvalidSchema {
                    model: schema.name.clone(),
                    reason: "model name is empty".to_string(),
                });
            }
            let properties = match &schema.properties {
                Value::Object(props) => props.clone(),
                Value::Null => Map::new(),
                other => {
                    return Err(OrmError::InvalidSchema {
                        model: schema.name.clone(),
                        reason: format!("properties must be an object, got {other}"),
                    })
                }
            };
            let model = Arc::new(MemoryModel {
                name: schema.name.clone(),
                properties: Mutex::new(properties),
                settings: schema.options.clone(),
                mixins: self.mixins.clone(),
                applied: Mutex::default(),
                hooks: Mutex::default(),
                phases: Mutex::default(),
                data_source: Mutex::default(),
            });
            Self::apply_declared_mixins(&model);
            tracing::debug!("Built model {}", model.name);
            models.insert(schema.name.clone(), model);
        }
        Ok(models)
    }
}

pub struct MemoryModel {
    name: String,
    properties: Mutex<Map<String, Value>>,
    settings: Map<String, Value>,
    mixins: MixinRegistry,
    applied: Mutex<Vec<String>>,
    hooks: Mutex<BTreeMap<String, Vec<OperationHook>>>,
    phases: Mutex<Vec<Phase>>,
    data_source: Mutex<Option<String>>,
}

impl MemoryModel {
    pub fn property(&self, name: &str) -> Option<Value> {
        lock(&self.properties).get(name).cloned()
    }

    pub fn property_names(&self) -> Vec<String> {
        lock(&self.properties).keys().cloned().collect()
    }

    /// The schema options (including folded top-level keys).
    pub fn settings(&self) -> &Map<String, Value> {
        &self.settings
    }

    /// Names of the mixins applied so far, in application order.
    pub fn applied_mixins(&self) -> Vec<String> {
        lock(&self.applied).clone()
    }

    /// Lifecycle phases this model was notified of, in order.
    pub fn phases(&self) -> Vec<Phase> {
        lock(&self.phases).clone()
    }

    /// Name of the datasource this model is attached to.
    pub fn data_source(&self) -> Option<String> {
        lock(&self.data_source).clone()
    }

    /// Run every observer of `operation` over `payload`; returns how many ran.
    pub fn trigger(&self, operation: &str, payload: &mut Value) -> usize {
        let hooks = lock(&self.hooks).get(operation).cloned().unwrap_or_default();
        for hook in &hooks {
            hook(payload);
        }
        hooks.len()
    }
}

impl fmt::Debug for MemoryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryModel")
            .field("name", &self.name)
            .field("properties", &self.property_names())
            .field("mixins", &self.applied_mixins())
            .field("data_source", &self.data_source())
            .finish()
    }
}

impl ModelClass for MemoryModel {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn define_property(&self, name: &str, spec: Value) {
        lock(&self.properties).insert(name.to_string(), spec);
    }

    fn mixin(&self, name: &str, options: &Value) -> Result<(), OrmError> {
        let mixin = self.mixins.get(name).ok_or_else(|| OrmError::UnknownMixin(name.to_string()))?;
        mixin(self, options);
        lock(&self.applied).push(name.to_string());
        Ok(())
    }

    fn observe(&self, operation: &str, hook: OperationHook) {
        lock(&self.hooks).entry(operation.to_string()).or_default().push(hook);
    }

    fn notify(&self, phase: Phase) {
        lock(&self.phases).push(phase);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct MemoryDataSource {
    name: String,
    settings: Value,
    builder: Arc<dyn ModelBuilder>,
    connected: AtomicBool,
    attached: Mutex<Vec<String>>,
    migrated: Mutex<Vec<String>>,
}

impl MemoryDataSource {
    pub fn new(name: impl Into<String>, settings: Value, builder: Arc<dyn ModelBuilder>) -> Self {
        Self {
            name: name.into(),
            settings,
            builder,
            connected: AtomicBool::new(false),
            attached: Mutex::default(),
            migrated: Mutex::default(),
        }
    }

    pub fn connector(&self) -> &str {
        self.settings.get("connector").and_then(Value::as_str).unwrap_or(CONNECTOR)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Names of the attached models, in attach order.
    pub fn attached_models(&self) -> Vec<String> {
        lock(&self.attached).clone()
    }

    /// Models covered by the last successful automigrate.
    pub fn migrated_models(&self) -> Vec<String> {
        lock(&self.migrated).clone()
    }

    fn check_connector(&self) -> Result<(), OrmError> {
        match self.connector() {
            CONNECTOR => Ok(()),
            other => Err(OrmError::Connection(format!(
                "connector \"{other}\" is not available for datasource {}",
                self.name
            ))),
        }
    }
}

impl DataSource for MemoryDataSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn settings(&self) -> &Value {
        &self.settings
    }

    fn model_builder(&self) -> Arc<dyn ModelBuilder> {
        Arc::clone(&self.builder)
    }

    fn connect(&self) -> Result<(), OrmError> {
        self.check_connector()?;
        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!("DataSource {} connected", self.name);
        Ok(())
    }

    fn disconnect(&self) -> Result<(), OrmError> {
        self.check_connector()?;
        self.connected.store(false, Ordering::SeqCst);
        lock(&self.attached).clear();
        tracing::debug!("DataSource {} disconnected", self.name);
        Ok(())
    }

    fn attach(&self, model: &ModelRef) {
        if let Some(memory) = model.as_any().downcast_ref::<MemoryModel>() {
            *lock(&memory.data_source) = Some(self.name.clone());
        }
        lock(&self.attached).push(model.model_name().to_string());
    }

    fn automigrate(&self) -> Result<(), OrmError> {
        self.check_connector().map_err(|e| OrmError::Migration(e.to_string()))?;
        let attached = self.attached_models();
        tracing::debug!("DataSource {} migrated {} models", self.name, attached.len());
        *lock(&self.migrated) = attached;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(value: Value) -> ModelSchema {
        serde_json::from_value(value).expect("schema")
    }

    #[test]
    fn builds_models_with_declared_properties() {
        let builder = MemoryModelBuilder::new();
        let models = builder
            .build_models(&[schema(json!({"name": "Author", "properties": {"name": "string"}}))])
            .expect("build");

        let author = models["Author"].as_any().downcast_ref::<MemoryModel>().expect("memory");
        assert_eq!(author.property("name"), Some(json!("string")));
    }

    #[test]
    fn rejects_non_object_properties() {
        let builder = MemoryModelBuilder::new();
        let err = builder
            .build_models(&[schema(json!({"name": "Book", "properties": ["title"]}))])
            .expect_err("array properties");
        assert!(matches!(err, OrmError::InvalidSchema { ref model, .. } if model == "Book"));
    }

    #[test]
    fn applies_mixins_declared_in_options() {
        let builder = MemoryModelBuilder::new();
        builder.mixins().define(
            "TimeStamp",
            Arc::new(|model: &dyn ModelClass, _: &Value| {
                model.define_property("createdAt", json!({"type": "date"}));
            }),
        );
        let models = builder
            .build_models(&[schema(json!({
                "name": "Book",
                "options": {"mixins": {"TimeStamp": true, "SoftDelete": false}}
            }))])
            .expect("build");

        let book = models["Book"].as_any().downcast_ref::<MemoryModel>().expect("memory");
        assert_eq!(book.applied_mixins(), vec!["TimeStamp".to_string()]);
        assert!(book.property("createdAt").is_some());
    }

    #[test]
    fn unknown_mixin_is_an_error() {
        let builder = MemoryModelBuilder::new();
        let models = builder.build_models(&[ModelSchema::new("Book")]).expect("build");
        let err = models["Book"].mixin("Missing", &json!({})).expect_err("unknown");
        assert_eq!(err, OrmError::UnknownMixin("Missing".to_string()));
    }

    #[test]
    fn observers_run_on_trigger() {
        let builder = MemoryModelBuilder::new();
        let models = builder.build_models(&[ModelSchema::new("Book")]).expect("build");
        models["Book"].observe(
            "before save",
            Arc::new(|data: &mut Value| {
                data["touched"] = json!(true);
            }),
        );

        let book = models["Book"].as_any().downcast_ref::<MemoryModel>().expect("memory");
        let mut payload = json!({});
        assert_eq!(book.trigger("before save", &mut payload), 1);
        assert_eq!(payload, json!({"touched": true}));
        assert_eq!(book.trigger("after save", &mut payload), 0);
    }

    #[test]
    fn foreign_connector_fails_to_connect() {
        let builder: Arc<dyn ModelBuilder> = Arc::new(MemoryModelBuilder::new());
        let ds = MemoryDataSource::new("pg", json!({"connector": "postgresql"}), builder);
        assert!(matches!(ds.connect(), Err(OrmError::Connection(_))));
        assert!(!ds.is_connected());
        assert!(matches!(ds.automigrate(), Err(OrmError::Migration(_))));
    }

    #[test]
    fn attach_and_migrate_track_models() {
        let builder: Arc<dyn ModelBuilder> = Arc::new(MemoryModelBuilder::new());
        let models = builder.build_models(&[ModelSchema::new("Author")]).expect("build");
        let ds = MemoryDataSource::new("db", json!({"connector": "memory"}), Arc::clone(&builder));

        ds.connect().expect("connect");
        ds.attach(&models["Author"]);
        ds.automigrate().expect("migrate");

        let author = models["Author"].as_any().downcast_ref::<MemoryModel>().expect("memory");
        assert_eq!(author.data_source().as_deref(), Some("db"));
        assert_eq!(ds.migrated_models(), vec!["Author".to_string()]);
        assert!(ds.is_connected());
    }
}
