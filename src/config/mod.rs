//! Configuration discovery and merging
//!
//! Logical configs (`datasources`, `model-config`) are layered base <
//! `.local` < `.<env>` and deep-merged over caller-supplied seed values.
//! The CLI's own settings file lives in [`settings`].

pub mod locator;
pub mod merge;
pub mod settings;

pub use locator::{find_config_files, ConfigVariant, LocatedFile, DATA_EXT, SCRIPT_EXT};
pub use merge::{merge_config_files, merge_object, merge_value, ConfigFile, ExtraSources};
pub use settings::{load_settings, Settings};

use crate::error::Result;
use crate::script::ScriptLoader;
use serde_json::{Map, Value};
use std::path::Path;

/// Locate and merge logical config `name` on top of `seed`.
pub fn load_merged(
    config_dir: &Path,
    env: &str,
    name: &str,
    seed: Map<String, Value>,
    scripts: &dyn ScriptLoader,
) -> Result<(Map<String, Value>, ExtraSources)> {
    let files = find_config_files(config_dir, env, name)?;
    let mut config = seed;
    let extra = merge_config_files(&mut config, &files, scripts)?;
    tracing::debug!("Loaded {} ({} files, {} entries)", name, files.len(), config.len());
    Ok((config, extra))
}
