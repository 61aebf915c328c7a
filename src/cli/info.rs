//! Info command implementation

use anyhow::Result;
use clap::Args;
use serde_json::Value;

use super::utils::{display_path, open_registry, ProjectArgs};
use model_registry::config::SCRIPT_EXT;
use model_registry::discovery::list_source_files;
use model_registry::utils::classify;

#[derive(Args)]
pub struct InfoArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

pub fn run(args: InfoArgs) -> Result<()> {
    let registry = open_registry(&args.project)?;
    let root = args.project.dir.canonicalize()?;

    println!("Project: {}", root.display());
    println!("Environment: {}", registry.env());

    println!("DataSources:");
    if registry.data_sources().is_empty() {
        println!("  (none)");
    }
    for (name, ds) in registry.data_sources() {
        let connector = ds.settings().get("connector").and_then(Value::as_str).unwrap_or("memory");
        println!("  {} (connector: {})", name, connector);
    }

    println!("Models:");
    if registry.model_definitions().is_empty() {
        println!("  (none)");
    }
    for (name, definition) in registry.model_definitions() {
        let known = registry.data_source(definition.data_source()).is_some();
        let marker = if known { "" } else { " [unknown datasource]" };
        match &definition.source_file {
            Some(script) => println!(
                "  {} -> {}{} (script: {})",
                name,
                definition.data_source(),
                marker,
                display_path(&root, script)
            ),
            None => println!("  {} -> {}{}", name, definition.data_source(), marker),
        }
    }

    println!("Mixins:");
    let mixins: Vec<String> = registry
        .mixin_sources()
        .iter()
        .flat_map(|dir| list_source_files(dir))
        .filter(|file| file.ext == SCRIPT_EXT)
        .map(|file| format!("{} ({})", classify(&file.base), display_path(&root, &file.path)))
        .collect();
    if mixins.is_empty() {
        println!("  (none)");
    }
    for mixin in &mixins {
        println!("  {}", mixin);
    }

    println!("Sources:");
    for dir in registry.model_sources() {
        println!("  models: {}", display_path(&root, dir));
    }
    for dir in registry.mixin_sources() {
        println!("  mixins: {}", display_path(&root, dir));
    }

    Ok(())
}
