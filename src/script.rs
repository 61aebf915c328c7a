//! Script resolution
//!
//! Discovery only finds script *files*; turning a discovered path into
//! something callable is delegated to a [`ScriptLoader`]. [`ScriptTable`] is a
//! static registration table keyed by file stem (`models/book.js` → `book`).

use crate::lifecycle::ModelHooks;
use crate::orm::{MixinFn, ModelClass, ModelRef};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A model augmentation script, called once with the freshly built model.
pub type ModelScript = Arc<dyn Fn(&ModelRef, &mut ModelHooks<'_>) + Send + Sync>;

/// Resolves discovered script files to callables.
pub trait ScriptLoader: Send + Sync {
    /// Augmentation script paired with a model schema.
    fn model_script(&self, path: &Path) -> Option<ModelScript>;

    /// Mixin function found in a mixin source directory.
    fn mixin(&self, path: &Path) -> Option<MixinFn>;

    /// Configuration produced by a scripted config variant (`*.local.js`).
    fn config(&self, path: &Path) -> Option<Value> {
        let _ = path;
        None
    }
}

fn file_stem(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}

#[derive(Clone, Default)]
pub struct ScriptTable {
    models: HashMap<String, ModelScript>,
    mixins: HashMap<String, MixinFn>,
    configs: HashMap<String, Value>,
}

impl ScriptTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the augmentation script for `models/<stem>.js`.
    pub fn with_model<F>(mut self, stem: &str, script: F) -> Self
    where
        F: Fn(&ModelRef, &mut ModelHooks<'_>) + Send + Sync + 'static,
    {
        self.models.insert(stem.to_string(), Arc::new(script));
        self
    }

    /// Register the mixin exported by `mixins/<stem>.js`.
    pub fn with_mixin<F>(mut self, stem: &str, mixin: F) -> Self
    where
        F: Fn(&dyn ModelClass, &Value) + Send + Sync + 'static,
    {
        self.mixins.insert(stem.to_string(), Arc::new(mixin));
        self
    }

    /// Register the value produced by a scripted config file, e.g.
    /// `datasources.local` for `config/datasources.local.js`.
    pub fn with_config(mut self, stem: &str, value: Value) -> Self {
        self.configs.insert(stem.to_string(), value);
        self
    }
}

impl ScriptLoader for ScriptTable {
    fn model_script(&self, path: &Path) -> Option<ModelScript> {
        file_stem(path).and_then(|stem| self.models.get(stem)).cloned()
    }

    fn mixin(&self, path: &Path) -> Option<MixinFn> {
        file_stem(path).and_then(|stem| self.mixins.get(stem)).cloned()
    }

    fn config(&self, path: &Path) -> Option<Value> {
        file_stem(path).and_then(|stem| self.configs.get(stem)).cloned()
    }
}

impl fmt::Debug for ScriptTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut models: Vec<_> = self.models.keys().collect();
        let mut mixins: Vec<_> = self.mixins.keys().collect();
        let mut configs: Vec<_> = self.configs.keys().collect();
        models.sort();
        mixins.sort();
        configs.sort();
        f.debug_struct("ScriptTable")
            .field("models", &models)
            .field("mixins", &mixins)
            .field("configs", &configs)
            .finish()
    }
}
