use anyhow::{Context, Result};
use symcat_core::db::schema::current_schema_version;

use crate::commands::{open_catalog, print_json, CatalogArgs};

/// Create the catalog file (or bring an existing one up to date).
pub fn init_command(args: &CatalogArgs) -> Result<()> {
    let catalog = open_catalog(args)?;
    let version = current_schema_version(catalog.connection()?)
        .context("Failed to read schema version")?;

    println!("Initialized catalog:");
    println!("  DB: {}", catalog.path().display());
    println!("  Schema version: {}", version);
    println!("  Batch size: {}", catalog.batch_size());
    Ok(())
}

pub fn stats_command(args: &CatalogArgs, json: bool) -> Result<()> {
    let catalog = open_catalog(args)?;
    let stats = catalog.stats().context("Failed to count catalog rows")?;

    if json {
        return print_json(&stats);
    }

    println!("Catalog: {}", catalog.path().display());
    println!("- Artifacts: {}", stats.artifacts);
    println!("- Devices: {}", stats.devices);
    println!("- Kernelcaches: {}", stats.kernelcaches);
    println!("- Shared caches: {}", stats.shared_caches);
    println!("- Images: {}", stats.images);
    println!("- Symbols: {}", stats.symbols);
    println!("- Image/symbol links: {}", stats.image_symbols);
    Ok(())
}
