//! Shared fixtures for integration tests

#![allow(dead_code)]

use model_registry::{MemoryOrm, Registry, RegistryOptions};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A throwaway project directory laid out as `config/`, `models/`, `mixins/`.
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self { dir: TempDir::new().expect("tmp") }
    }

    /// Project with one memory datasource `db` and an `Author` model bound to it.
    pub fn with_author() -> Self {
        Self::new()
            .file("config/datasources.json", r#"{"db": {"connector": "memory"}}"#)
            .file("config/model-config.json", r#"{"Author": {"dataSource": "db"}}"#)
            .file("models/author.json", r#"{"properties": {"name": "string"}}"#)
    }

    /// Write `contents` to `rel`, creating parent directories.
    pub fn file(self, rel: &str, contents: &str) -> Self {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(&path, contents).expect("write");
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Options rooted at this project with a fixed environment.
    pub fn options(&self) -> RegistryOptions {
        RegistryOptions::new().dir(self.path()).env("test")
    }

    pub fn registry(&self) -> Registry {
        self.registry_with(self.options())
    }

    pub fn registry_with(&self, options: RegistryOptions) -> Registry {
        Registry::new(Arc::new(MemoryOrm::new()), options).expect("registry")
    }
}
