//! Error types for the registry.

use crate::orm::OrmError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors raised while discovering configuration or driving datasources.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No datasource configuration was found or seeded.
    #[error("No DataSources configured")]
    NoDataSources,

    /// No model configuration was found or seeded.
    #[error("No Models configured")]
    NoModels,

    /// Unexpected filesystem error (anything other than "not found").
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A config or schema file did not contain valid JSON.
    #[error("invalid JSON in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The model-builder rejected a batch of schemas.
    #[error("model build failed: {0}")]
    Build(#[from] OrmError),

    /// One or more datasources failed a fan-out operation.
    #[error("{operation} failed for {}", Failures(.failures))]
    DataSources { operation: &'static str, failures: Vec<(String, OrmError)> },
}

impl RegistryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Failures reported by individual datasources, if this is a fan-out error.
    pub fn data_source_failures(&self) -> &[(String, OrmError)] {
        match self {
            Self::DataSources { failures, .. } => failures,
            _ => &[],
        }
    }
}

struct Failures<'a>(&'a [(String, OrmError)]);

impl fmt::Display for Failures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, err)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name} ({err})")?;
        }
        Ok(())
    }
}
