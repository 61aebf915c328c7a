//! Boot command implementation

use anyhow::{Context, Result};
use clap::Args;

use super::utils::{open_registry, ProjectArgs};
use model_registry::orm::MemoryModel;
use model_registry::{Phase, RegistryError};

#[derive(Args)]
pub struct BootArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Run automigrate on every datasource after connecting
    #[arg(long)]
    pub automigrate: bool,
}

pub fn run(args: BootArgs) -> Result<()> {
    let mut registry = open_registry(&args.project)?;

    for name in registry.model_definitions().keys().cloned().collect::<Vec<_>>() {
        registry.on(&name, Phase::Boot, |model, _| {
            tracing::debug!("Booted {}", model.model_name());
        });
    }

    let connected = match registry.connect() {
        Ok(_) => Ok(()),
        Err(e @ RegistryError::DataSources { .. }) => Err(e),
        Err(e) => return Err(e).context("Failed to connect"),
    };

    let migrated = if args.automigrate {
        let migrated = registry.automigrate(&[]);
        let failed = migrated.as_ref().err().map_or(0, |e| e.data_source_failures().len());
        println!("Migrated {} datasources", registry.data_sources().len().saturating_sub(failed));
        migrated
    } else {
        Ok(())
    };

    let count = registry.models().map_or(0, |models| models.len());
    for (name, model) in registry.models().into_iter().flatten() {
        let attached = model
            .as_any()
            .downcast_ref::<MemoryModel>()
            .and_then(MemoryModel::data_source)
            .unwrap_or_else(|| "-".to_string());
        println!("{} attached to {}", name, attached);
    }
    println!("Booted {} models", count);

    let disconnected = registry.disconnect();
    connected.context("Failed to connect")?;
    migrated.context("Failed to automigrate")?;
    disconnected.context("Failed to disconnect")?;
    Ok(())
}
