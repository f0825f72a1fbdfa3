use std::path::PathBuf;

use anyhow::{Context, Result};
use symcat_core::db::{load_catalog_config, Catalog, CatalogConfig, DEFAULT_BATCH_SIZE};
use tracing::debug;

/// Where the catalog lives and how it batches writes, as given on the command line.
#[derive(Debug, Clone)]
pub struct CatalogArgs {
    pub db: PathBuf,
    pub batch_size: Option<usize>,
    /// JSON config file. Takes precedence over `db` and `batch_size`.
    pub config: Option<PathBuf>,
}

impl CatalogArgs {
    pub fn new(db: impl Into<PathBuf>) -> Self {
        Self { db: db.into(), batch_size: None, config: None }
    }
}

/// Resolve the effective catalog config from flags or a config file.
pub fn resolve_catalog_config(args: &CatalogArgs) -> Result<CatalogConfig> {
    match &args.config {
        Some(file) => load_catalog_config(file),
        None => Ok(CatalogConfig::new(&args.db, args.batch_size.unwrap_or(DEFAULT_BATCH_SIZE))),
    }
}

/// Open the catalog described by `args`, creating or migrating it as needed.
pub fn open_catalog(args: &CatalogArgs) -> Result<Catalog> {
    let config = resolve_catalog_config(args)?;
    debug!(
        path = %config.path.display(),
        batch_size = config.batch_size,
        from_file = args.config.is_some(),
        "opening catalog"
    );
    Catalog::open_with(&config)
        .with_context(|| format!("Failed to open catalog at {}", config.path.display()))
}

/// Print `value` as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(value)?;
    println!("{}", serialized);
    Ok(())
}

pub fn opt_display(value: Option<&str>) -> &str {
    value.unwrap_or("(none)")
}
