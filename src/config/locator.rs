//! Config file discovery
//!
//! A logical config `name` lives in `<config_dir>/<name>.json`, optionally
//! overridden by `<name>.local.{js,json}` and `<name>.<env>.{js,json}`.

use crate::error::{RegistryError, Result};
use crate::utils::absolute;
use std::path::{Path, PathBuf};

/// Extension of plain data files.
pub const DATA_EXT: &str = "json";

/// Extension of script files (model augmentation, mixins, scripted configs).
pub const SCRIPT_EXT: &str = "js";

/// Which layer of a logical config a file provides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigVariant {
    Base,
    Local,
    Env(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedFile {
    pub path: PathBuf,
    pub variant: ConfigVariant,
}

impl LocatedFile {
    pub fn is_script(&self) -> bool {
        self.path.extension().and_then(|e| e.to_str()) == Some(SCRIPT_EXT)
    }
}

/// Locate the files of logical config `name`, in merge order
/// (base, `.local`, `.<env>`).
///
/// Without a base file the config is unconfigured and nothing is returned;
/// a present override variant is reported as a warning.
pub fn find_config_files(config_dir: &Path, env: &str, name: &str) -> Result<Vec<LocatedFile>> {
    let config_dir = absolute(config_dir).map_err(|e| RegistryError::io(config_dir, e))?;

    let local_name = format!("{name}.local");
    let env_name = format!("{name}.{env}");

    let Some(base) = if_exists(&config_dir.join(format!("{name}.{DATA_EXT}")))? else {
        if if_exists_with_any_ext(&config_dir, &local_name)?.is_some()
            || if_exists_with_any_ext(&config_dir, &env_name)?.is_some()
        {
            tracing::warn!("Main config file \"{name}.{DATA_EXT}\" is missing");
        }
        return Ok(Vec::new());
    };

    let candidates = [
        Some(LocatedFile { path: base, variant: ConfigVariant::Base }),
        if_exists_with_any_ext(&config_dir, &local_name)?
            .map(|path| LocatedFile { path, variant: ConfigVariant::Local }),
        if_exists_with_any_ext(&config_dir, &env_name)?
            .map(|path| LocatedFile { path, variant: ConfigVariant::Env(env.to_string()) }),
    ];

    Ok(candidates.into_iter().flatten().collect())
}

fn if_exists(path: &Path) -> Result<Option<PathBuf>> {
    match path.try_exists() {
        Ok(true) => Ok(Some(path.to_path_buf())),
        Ok(false) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RegistryError::io(path, e)),
    }
}

/// Scripted variant first, then the data variant.
fn if_exists_with_any_ext(dir: &Path, file_name: &str) -> Result<Option<PathBuf>> {
    for ext in [SCRIPT_EXT, DATA_EXT] {
        if let Some(path) = if_exists(&dir.join(format!("{file_name}.{ext}")))? {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "{}").expect("write");
    }

    fn names(files: &[LocatedFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.path.file_name().and_then(|n| n.to_str()).unwrap_or("").to_string())
            .collect()
    }

    #[test]
    fn base_only() {
        let tmp = TempDir::new().expect("tmp");
        touch(tmp.path(), "datasources.json");

        let files = find_config_files(tmp.path(), "development", "datasources").expect("find");
        assert_eq!(names(&files), vec!["datasources.json"]);
        assert_eq!(files[0].variant, ConfigVariant::Base);
        assert!(files[0].path.is_absolute());
    }

    #[test]
    fn variants_in_precedence_order() {
        let tmp = TempDir::new().expect("tmp");
        touch(tmp.path(), "datasources.production.json");
        touch(tmp.path(), "datasources.local.json");
        touch(tmp.path(), "datasources.json");
        touch(tmp.path(), "datasources.development.json");

        let files = find_config_files(tmp.path(), "production", "datasources").expect("find");
        assert_eq!(
            names(&files),
            vec!["datasources.json", "datasources.local.json", "datasources.production.json"]
        );
        assert_eq!(files[2].variant, ConfigVariant::Env("production".to_string()));
    }

    #[test]
    fn scripted_variant_wins_over_data_variant() {
        let tmp = TempDir::new().expect("tmp");
        touch(tmp.path(), "model-config.json");
        touch(tmp.path(), "model-config.local.json");
        touch(tmp.path(), "model-config.local.js");

        let files = find_config_files(tmp.path(), "development", "model-config").expect("find");
        assert_eq!(names(&files), vec!["model-config.json", "model-config.local.js"]);
        assert!(files[1].is_script());
    }

    #[test]
    fn overrides_without_base_are_ignored() {
        let tmp = TempDir::new().expect("tmp");
        touch(tmp.path(), "datasources.local.json");
        touch(tmp.path(), "datasources.development.json");

        let files = find_config_files(tmp.path(), "development", "datasources").expect("find");
        assert!(files.is_empty());
    }

    #[test]
    fn missing_directory_is_unconfigured() {
        let tmp = TempDir::new().expect("tmp");
        let files =
            find_config_files(&tmp.path().join("nope"), "development", "datasources").expect("find");
        assert!(files.is_empty());
    }
}
