//! Model and mixin discovery in source directories

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub mod mixins;
pub mod models;

pub use mixins::load_mixin_definitions;
pub use models::{load_model_definitions, ModelDefinition, DEFAULT_DATA_SOURCE};

/// A file found directly inside a source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// File name without its extension.
    pub base: String,
    pub ext: String,
}

/// List the files directly inside `dir`, sorted by file name.
///
/// A missing or unreadable directory has no entries.
pub fn list_source_files(dir: &Path) -> Vec<SourceFile> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let path = entry.into_path();
            let base = path.file_stem()?.to_str()?.to_string();
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_string();
            Some(SourceFile { path, base, ext })
        })
        .collect()
}
