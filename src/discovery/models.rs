//! Model definition discovery
//!
//! Each source directory may hold `<base>.json` schema files and `<base>.js`
//! augmentation scripts, paired by base name. Directories are scanned in
//! order, so a later directory replaces an earlier definition with the same
//! base name. Only models with an object entry in the model configuration
//! survive.

use super::list_source_files;
use crate::config::{DATA_EXT, SCRIPT_EXT};
use crate::error::{RegistryError, Result};
use crate::orm::ModelSchema;
use crate::utils::classify;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Datasource used when the model configuration names none.
pub const DEFAULT_DATA_SOURCE: &str = "db";

const RESERVED_KEYS: [&str; 3] = ["name", "properties", "options"];

#[derive(Debug, Clone, PartialEq)]
pub struct ModelDefinition {
    /// Logical model name: the schema's `name`, or the Pascal-cased base name.
    pub name: String,
    pub definition: ModelSchema,
    /// Augmentation script paired by base name.
    pub source_file: Option<PathBuf>,
    /// Datasource named by the model configuration.
    pub data_source: Option<String>,
    pub load: bool,
}

impl ModelDefinition {
    /// Target datasource name, defaulting to [`DEFAULT_DATA_SOURCE`].
    pub fn data_source(&self) -> &str {
        self.data_source.as_deref().unwrap_or(DEFAULT_DATA_SOURCE)
    }
}

/// Per base name accumulator; a script may show up before its schema.
#[derive(Default)]
struct Entry {
    schema: Option<ModelDefinition>,
    source_file: Option<PathBuf>,
}

/// Scan `sources` in order and return the active definitions keyed by
/// logical model name.
pub fn load_model_definitions(
    sources: &[PathBuf],
    model_config: &Map<String, Value>,
) -> Result<BTreeMap<String, ModelDefinition>> {
    let mut entries: HashMap<String, Entry> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for dir in sources {
        for file in list_source_files(dir) {
            if !entries.contains_key(&file.base) {
                order.push(file.base.clone());
            }
            let entry = entries.entry(file.base.clone()).or_default();

            match file.ext.as_str() {
                DATA_EXT => {
                    let Some(definition) = read_definition(&file.path, &file.base, model_config)? else {
                        continue;
                    };
                    tracing::debug!(
                        "Found model {} in {} (load: {})",
                        definition.name,
                        file.path.display(),
                        definition.load
                    );
                    entry.schema = Some(definition);
                }
                SCRIPT_EXT => entry.source_file = Some(file.path),
                _ => {}
            }
        }
    }

    let mut models = BTreeMap::new();
    for base in order {
        let Some(Entry { schema: Some(mut definition), source_file }) = entries.remove(&base) else {
            continue;
        };
        if !definition.load {
            continue;
        }
        definition.source_file = source_file;
        models.insert(definition.name.clone(), definition);
    }
    Ok(models)
}

fn read_definition(
    path: &Path,
    base: &str,
    model_config: &Map<String, Value>,
) -> Result<Option<ModelDefinition>> {
    let raw = fs::read_to_string(path).map_err(|e| RegistryError::io(path, e))?;
    let content: Value = serde_json::from_str(&raw)
        .map_err(|source| RegistryError::Parse { path: path.to_path_buf(), source })?;
    let Value::Object(content) = content else {
        tracing::warn!("Ignoring model schema {}: not a JSON object", path.display());
        return Ok(None);
    };

    let (explicit_name, definition) = build_schema(content);
    let name = explicit_name.unwrap_or_else(|| classify(base));

    let (load, data_source) = match model_config.get(&name) {
        Some(Value::Object(entry)) => {
            (true, entry.get("dataSource").and_then(Value::as_str).map(str::to_string))
        }
        _ => (false, None),
    };

    Ok(Some(ModelDefinition {
        definition: ModelSchema { name: name.clone(), ..definition },
        name,
        source_file: None,
        data_source,
        load,
    }))
}

/// Split a schema file into `name`, `properties` and `options`; every other
/// top-level key is folded into `options`, winning over the file's own
/// `options` entries.
fn build_schema(mut content: Map<String, Value>) -> (Option<String>, ModelSchema) {
    let name = match content.remove(RESERVED_KEYS[0]) {
        Some(Value::String(name)) if !name.is_empty() => Some(name),
        _ => None,
    };
    let properties = content.remove(RESERVED_KEYS[1]).unwrap_or_else(|| Value::Object(Map::new()));
    let mut options = match content.remove(RESERVED_KEYS[2]) {
        Some(Value::Object(options)) => options,
        _ => Map::new(),
    };
    options.extend(content);

    (name, ModelSchema { name: String::new(), properties, options })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use similar_asserts::assert_eq;
    use tempfile::TempDir;

    fn config(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn build_schema_folds_extra_keys_into_options() {
        let content = config(json!({
            "name": "Book",
            "properties": {"title": "string"},
            "options": {"strict": false, "idInjection": true},
            "strict": true,
            "relations": {"author": {"type": "belongsTo", "model": "Author"}}
        }));
        let (name, schema) = build_schema(content);

        assert_eq!(name.as_deref(), Some("Book"));
        assert_eq!(schema.properties, json!({"title": "string"}));
        assert_eq!(
            Value::Object(schema.options),
            json!({
                "strict": true,
                "idInjection": true,
                "relations": {"author": {"type": "belongsTo", "model": "Author"}}
            })
        );
    }

    #[test]
    fn only_configured_models_are_loaded() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(tmp.path().join("author.json"), r#"{"properties":{"name":"string"}}"#).expect("write");
        fs::write(tmp.path().join("book.json"), r#"{"properties":{"title":"string"}}"#).expect("write");
        fs::write(tmp.path().join("book.js"), "").expect("write");

        let models = load_model_definitions(
            &[tmp.path().to_path_buf()],
            &config(json!({"Author": {"dataSource": "mongo"}})),
        )
        .expect("load");

        assert_eq!(models.len(), 1);
        let author = &models["Author"];
        assert_eq!(author.data_source(), "mongo");
        assert_eq!(author.definition.name, "Author");
        assert!(author.source_file.is_none());
    }

    #[test]
    fn pairs_scripts_and_defaults_datasource() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(tmp.path().join("order-item.js"), "").expect("write");
        fs::write(tmp.path().join("order-item.json"), "{}").expect("write");

        let models =
            load_model_definitions(&[tmp.path().to_path_buf()], &config(json!({"OrderItem": {}})))
                .expect("load");

        let item = &models["OrderItem"];
        assert_eq!(item.data_source(), DEFAULT_DATA_SOURCE);
        assert_eq!(item.source_file, Some(tmp.path().join("order-item.js")));
        assert_eq!(item.definition.properties, json!({}));
    }

    #[test]
    fn explicit_schema_name_overrides_file_name() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(tmp.path().join("person.json"), r#"{"name":"Customer"}"#).expect("write");

        let models =
            load_model_definitions(&[tmp.path().to_path_buf()], &config(json!({"Customer": {}})))
                .expect("load");
        assert!(models.contains_key("Customer"));

        let none =
            load_model_definitions(&[tmp.path().to_path_buf()], &config(json!({"Person": {}})))
                .expect("load");
        assert!(none.is_empty());
    }

    #[test]
    fn later_directories_override_same_base_name() {
        let tmp = TempDir::new().expect("tmp");
        let first = tmp.path().join("models");
        let second = tmp.path().join("extra");
        fs::create_dir_all(&first).expect("mkdir");
        fs::create_dir_all(&second).expect("mkdir");
        fs::write(first.join("book.json"), r#"{"properties":{"title":"string"}}"#).expect("write");
        fs::write(first.join("book.js"), "").expect("write");
        fs::write(second.join("book.json"), r#"{"properties":{"isbn":"string"}}"#).expect("write");

        let models = load_model_definitions(&[first.clone(), second], &config(json!({"Book": {}})))
            .expect("load");

        let book = &models["Book"];
        assert_eq!(book.definition.properties, json!({"isbn": "string"}));
        assert_eq!(book.source_file, Some(first.join("book.js")));
    }

    #[test]
    fn non_object_config_entries_do_not_load() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(tmp.path().join("author.json"), "{}").expect("write");

        let models =
            load_model_definitions(&[tmp.path().to_path_buf()], &config(json!({"Author": true})))
                .expect("load");
        assert!(models.is_empty());
    }

    #[test]
    fn invalid_schema_json_is_an_error() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(tmp.path().join("author.json"), "{").expect("write");

        let err = load_model_definitions(&[tmp.path().to_path_buf()], &config(json!({"Author": {}})))
            .expect_err("parse");
        assert!(matches!(err, RegistryError::Parse { .. }));
    }
}
