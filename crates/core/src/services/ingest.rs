//! Bulk symbol ingestion for one image.
//!
//! Ingest is batched for throughput and is *not* atomic: each batch commits on
//! its own, so an interrupted run leaves a committed prefix. Reruns are safe
//! because every write is a create-or-find on a natural key.

use std::thread;
use std::time::Duration;

use rusqlite::Error as SqlError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::entity::find_or_insert;
use crate::db::{BinaryImage, Catalog, DbResult, ImageSymbolLink, Symbol};

/// Summary of one successful ingest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub image_uuid: String,
    /// Symbols processed (interned or already present).
    pub symbols: usize,
    /// Symbol rows newly created by this run.
    pub new_symbols: usize,
    /// Link rows newly created by this run.
    pub new_links: usize,
    pub batches: usize,
    /// Attempts taken, including the successful one.
    pub attempts: u32,
}

/// Create-or-find `image`, then intern each symbol and link it to the image.
pub fn ingest_image_symbols(
    catalog: &Catalog,
    image: &BinaryImage,
    symbols: &[Symbol],
) -> DbResult<IngestReport> {
    let image = catalog.create_or_find(image.clone())?;
    let mut new_symbols = 0usize;
    let mut new_links = 0usize;

    let batches = catalog.in_batches(symbols.iter().cloned(), |conn, now, candidate| {
        let (symbol, inserted) = find_or_insert(conn, candidate, now)?;
        new_symbols += usize::from(inserted);
        let symbol_id = symbol.id.ok_or(SqlError::QueryReturnedNoRows)?;
        let (_, linked) = find_or_insert(conn, ImageSymbolLink::new(&image.uuid, symbol_id), now)?;
        new_links += usize::from(linked);
        Ok(())
    })?;

    info!(
        image = %image.uuid,
        symbols = symbols.len(),
        new_symbols,
        new_links,
        batches,
        "image symbols ingested"
    );
    Ok(IngestReport {
        image_uuid: image.uuid,
        symbols: symbols.len(),
        new_symbols,
        new_links,
        batches,
        attempts: 1,
    })
}

/// Retry loop around [`ingest_image_symbols`].
///
/// Transient failures (lock contention) rerun the whole ingest; committed
/// batches are found again rather than duplicated. Anything else is returned
/// on the spot.
#[derive(Debug, Clone)]
pub struct ResumableIngest {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for ResumableIngest {
    fn default() -> Self {
        Self { max_attempts: 3, backoff: Duration::from_millis(250) }
    }
}

impl ResumableIngest {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1), ..Self::default() }
    }

    pub fn run(
        &self,
        catalog: &Catalog,
        image: &BinaryImage,
        symbols: &[Symbol],
    ) -> DbResult<IngestReport> {
        let mut attempt = 1u32;
        loop {
            match ingest_image_symbols(catalog, image, symbols) {
                Ok(mut report) => {
                    report.attempts = attempt;
                    return Ok(report);
                }
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    warn!(image = %image.uuid, attempt, error = %err, "ingest interrupted, retrying");
                    thread::sleep(self.backoff);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
