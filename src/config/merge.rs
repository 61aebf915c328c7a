//! Config file loading and merging
//!
//! Files are merged in the order the locator returns them, so a later layer
//! wins: objects merge key-wise, every other value (scalars, arrays, `null`)
//! is replaced wholesale. The reserved `_meta` block never reaches the merged
//! config; its `sources` and `mixins` lists name extra discovery directories.

use super::locator::{ConfigVariant, LocatedFile};
use crate::error::{RegistryError, Result};
use crate::script::ScriptLoader;
use crate::utils::resolve_source;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const META_KEY: &str = "_meta";

/// A loaded config file. The path is kept only to resolve `_meta` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub path: PathBuf,
    pub variant: ConfigVariant,
    pub content: Value,
}

impl ConfigFile {
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// Extra model and mixin directories declared through `_meta`, in
/// declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraSources {
    pub models: Vec<PathBuf>,
    pub mixins: Vec<PathBuf>,
}

/// Deep-merge `source` into `target`.
pub fn merge_value(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => merge_object(target, source),
        (target, source) => *target = source,
    }
}

/// Key-wise deep merge of two objects.
pub fn merge_object(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match target.get_mut(&key) {
            Some(existing) => merge_value(existing, value),
            None => {
                target.insert(key, value);
            }
        }
    }
}

/// Load one located file. Scripted variants are resolved through `scripts`;
/// `None` means the script has no registered config.
pub fn load_config_file(file: &LocatedFile, scripts: &dyn ScriptLoader) -> Result<Option<ConfigFile>> {
    let content = if file.is_script() {
        match scripts.config(&file.path) {
            Some(value) => value,
            None => {
                tracing::warn!("No config registered for script {}", file.path.display());
                return Ok(None);
            }
        }
    } else {
        let raw = fs::read_to_string(&file.path).map_err(|e| RegistryError::io(&file.path, e))?;
        serde_json::from_str(&raw)
            .map_err(|source| RegistryError::Parse { path: file.path.clone(), source })?
    };

    Ok(Some(ConfigFile { path: file.path.clone(), variant: file.variant.clone(), content }))
}

/// Merge `files` into `config` and collect their `_meta` source directories.
pub fn merge_config_files(
    config: &mut Map<String, Value>,
    files: &[LocatedFile],
    scripts: &dyn ScriptLoader,
) -> Result<ExtraSources> {
    let mut extra = ExtraSources::default();

    for file in files {
        let Some(loaded) = load_config_file(file, scripts)? else {
            continue;
        };
        let dir = loaded.dir().to_path_buf();
        let Value::Object(mut content) = loaded.content else {
            tracing::warn!("Ignoring config {}: not a JSON object", loaded.path.display());
            continue;
        };

        if let Some(Value::Object(meta)) = content.remove(META_KEY) {
            extra.models.extend(resolve_sources(&dir, meta.get("sources"), &loaded.path));
            extra.mixins.extend(resolve_sources(&dir, meta.get("mixins"), &loaded.path));
        }

        tracing::debug!("Merging config {}", loaded.path.display());
        merge_object(config, content);
    }

    Ok(extra)
}

fn resolve_sources(dir: &Path, sources: Option<&Value>, declared_in: &Path) -> Vec<PathBuf> {
    let Some(Value::Array(sources)) = sources else {
        return Vec::new();
    };
    sources
        .iter()
        .filter_map(|source| match source {
            Value::String(s) => Some(resolve_source(dir, s)),
            other => {
                tracing::warn!("Ignoring non-string source {} in {}", other, declared_in.display());
                None
            }
        })
        .collect()
}
