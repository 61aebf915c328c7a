//! model-registry: inspect and boot configuration-driven model registries
//!
//! Discovers datasources, models and mixins in a project directory and wires
//! them together against the in-memory ORM.

use anyhow::Result;

mod cli;

fn main() -> Result<()> {
    cli::run()
}
