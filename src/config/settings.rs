//! Settings file loading for the command-line tool

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory layout and environment read from `model-registry.toml` (or YAML).
///
/// Relative paths are resolved against the project root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub config_dir: Option<PathBuf>,
    pub models_dir: Option<PathBuf>,
    pub mixins_dir: Option<PathBuf>,
    pub env: Option<String>,
}

impl Settings {
    fn resolve_paths(mut self, root: &Path) -> Self {
        for dir in [&mut self.config_dir, &mut self.models_dir, &mut self.mixins_dir] {
            if let Some(path) = dir.as_mut() {
                if path.is_relative() {
                    *path = root.join(&*path);
                }
            }
        }
        self
    }
}

/// Load settings from `settings_path`, or discover them in `root`.
///
/// An explicitly provided file must parse; a discovered one that does not is
/// reported and ignored.
pub fn load_settings(root: &Path, settings_path: Option<&Path>) -> Result<Settings> {
    let settings_path_provided = settings_path.is_some();

    let discovered = match settings_path {
        Some(path) => Some(path.to_path_buf()),
        None => discover_settings(root),
    };

    let Some(settings_file) = discovered else {
        return Ok(Settings::default());
    };

    let content = fs::read_to_string(&settings_file)
        .with_context(|| format!("Failed reading settings file: {}", settings_file.display()))?;

    let ext = settings_file.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "toml" => parse_toml_settings(&content, &settings_file),
        "yaml" | "yml" => parse_yaml_settings(&content, &settings_file),
        other => Err(anyhow::anyhow!(
            "Unsupported settings extension '.{}' for file {}",
            other,
            settings_file.display()
        )),
    };

    match parsed {
        Ok(settings) => Ok(settings.resolve_paths(root)),
        Err(e) if !settings_path_provided => {
            tracing::warn!(
                "Failed to parse auto-discovered settings {}: {:#}",
                settings_file.display(),
                e
            );
            Ok(Settings::default())
        }
        Err(e) => Err(e),
    }
}

/// Parse TOML settings, accepting an optional `[model-registry]` section.
fn parse_toml_settings(content: &str, settings_file: &Path) -> Result<Settings> {
    let raw: toml::Value = toml::from_str(content)
        .with_context(|| format!("Invalid TOML syntax: {}", settings_file.display()))?;

    let section = raw.get("model-registry").cloned().unwrap_or(raw);

    section.try_into().with_context(|| format!("Invalid TOML settings: {}", settings_file.display()))
}

/// Parse YAML settings, accepting an optional `model-registry` section.
fn parse_yaml_settings(content: &str, settings_file: &Path) -> Result<Settings> {
    let raw: serde_yaml::Value = serde_yaml::from_str(content)
        .with_context(|| format!("Invalid YAML syntax: {}", settings_file.display()))?;

    let section = raw.get("model-registry").cloned().unwrap_or(raw);

    serde_yaml::from_value(section)
        .with_context(|| format!("Invalid YAML settings: {}", settings_file.display()))
}

fn discover_settings(root: &Path) -> Option<PathBuf> {
    let candidates = [
        "model-registry.toml",
        ".model-registry.toml",
        "model-registry.yaml",
        "model-registry.yml",
    ];

    candidates.iter().map(|candidate| root.join(candidate)).find(|path| path.exists())
}
