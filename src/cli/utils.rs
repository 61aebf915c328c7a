use anyhow::{Context, Result};
use clap::Args;
use model_registry::config::load_settings;
use model_registry::{MemoryOrm, Registry, RegistryOptions, ENV_VAR};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Project location and layout overrides shared by every subcommand.
#[derive(Args)]
pub struct ProjectArgs {
    /// Project root directory
    #[arg(value_name = "DIR", default_value = ".")]
    pub dir: PathBuf,

    /// Environment used to select `<name>.<env>.json` overrides
    #[arg(long, env = ENV_VAR, value_name = "ENV")]
    pub env: Option<String>,

    /// Config directory (default: <DIR>/config)
    #[arg(long, value_name = "PATH")]
    pub config_dir: Option<PathBuf>,

    /// Models directory (default: <DIR>/models)
    #[arg(long, value_name = "PATH")]
    pub models_dir: Option<PathBuf>,

    /// Mixins directory (default: <DIR>/mixins)
    #[arg(long, value_name = "PATH")]
    pub mixins_dir: Option<PathBuf>,

    /// Settings file (default: discovered model-registry.toml / .yaml in <DIR>)
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,
}

/// Build a registry over the in-memory ORM.
///
/// Precedence: command-line flag > environment variable > settings file > defaults.
pub fn open_registry(args: &ProjectArgs) -> Result<Registry> {
    let root = args
        .dir
        .canonicalize()
        .with_context(|| format!("Project directory not found: {}", args.dir.display()))?;
    if !root.is_dir() {
        anyhow::bail!("Path is not a directory: {}", root.display());
    }

    let settings = load_settings(&root, args.settings.as_deref())?;

    let mut options = RegistryOptions::new().dir(&root);
    options.config_dir = args.config_dir.clone().or(settings.config_dir);
    options.models_dir = args.models_dir.clone().or(settings.models_dir);
    options.mixins_dir = args.mixins_dir.clone().or(settings.mixins_dir);
    options.env = args.env.clone().or(settings.env);

    Registry::new(Arc::new(MemoryOrm::new()), options)
        .with_context(|| format!("Failed to load registry from {}", root.display()))
}

/// Display `path` relative to `root` when it lies inside it.
pub fn display_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}
