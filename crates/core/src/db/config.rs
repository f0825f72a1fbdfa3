use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

/// Default number of rows grouped into one write transaction during bulk ingest.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Construction-time configuration for a [`crate::db::Catalog`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Path to the catalog database file. Required.
    pub path: PathBuf,
    /// Rows per write transaction. Smaller favors atomicity, larger favors throughput.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl CatalogConfig {
    pub fn new(path: impl Into<PathBuf>, batch_size: usize) -> Self {
        Self { path: path.into(), batch_size }
    }

    /// Reject configurations that must never reach storage.
    pub fn validate(&self) -> DbResult<()> {
        if self.path.as_os_str().to_string_lossy().trim().is_empty() {
            return Err(DbError::Config("'path' is required".into()));
        }
        if self.batch_size == 0 {
            return Err(DbError::Config("'batch_size' must be a positive integer".into()));
        }
        Ok(())
    }
}

/// Load a catalog config from a JSON file.
///
/// A relative `path` inside the file is resolved against the file's directory.
pub fn load_catalog_config(file: &Path) -> Result<CatalogConfig> {
    let body = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read catalog config at {}", file.display()))?;
    let mut config: CatalogConfig =
        serde_json::from_str(&body).context("Failed to parse catalog config JSON")?;
    if config.path.is_relative() && !config.path.as_os_str().is_empty() {
        if let Some(dir) = file.parent() {
            config.path = dir.join(&config.path);
        }
    }
    Ok(config)
}
