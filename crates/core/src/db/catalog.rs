use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode};
use thiserror::Error;
use tracing::{debug, info};

use crate::db::entity::{addr_to_sql, find_or_insert, select_all, select_one};
use crate::db::schema::apply_schema;
use crate::db::{
    Artifact, BinaryImage, CatalogConfig, CatalogStats, Device, Entity, Kernelcache, SharedCache,
    Symbol,
};

/// Error type for catalog operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Missing or invalid construction parameters. Fix the configuration before retrying.
    #[error("Invalid catalog configuration: {0}")]
    Config(String),

    /// Underlying SQLite error (I/O failure, constraint violation).
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// The database was created with a newer schema version than we support.
    #[error(
        "Unsupported schema version {found}; supported range is {min_supported}..={max_supported}"
    )]
    UnsupportedSchemaVersion { found: i32, min_supported: i32, max_supported: i32 },

    /// The handle has already been closed.
    #[error("Catalog is closed")]
    Closed,

    /// A lookup found nothing. An expected outcome, not a store failure.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
}

impl DbError {
    fn not_found(entity: &'static str, key: impl ToString) -> Self {
        DbError::NotFound { entity, key: key.to_string() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }

    /// True for lock contention, which is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            DbError::Sql(rusqlite::Error::SqliteFailure(err, _)) => {
                matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            }
            _ => false,
        }
    }
}

/// Convenience result type for DB operations.
pub type DbResult<T> = Result<T, DbError>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// SQLite-backed firmware symbol catalog.
///
/// Owns the single storage handle for the process. Every operation runs to
/// completion on the calling thread. After [`Catalog::close`] all operations
/// fail with [`DbError::Closed`].
#[derive(Debug)]
pub struct Catalog {
    conn: Option<Connection>,
    path: PathBuf,
    batch_size: usize,
}

impl Catalog {
    /// Open (or create) a catalog at `path` and bring its schema up to date.
    pub fn open(path: impl AsRef<Path>, batch_size: usize) -> DbResult<Self> {
        Self::open_with(&CatalogConfig::new(path.as_ref(), batch_size))
    }

    pub fn open_with(config: &CatalogConfig) -> DbResult<Self> {
        config.validate()?;
        let started_at = Instant::now();
        let conn = Connection::open(&config.path)?;
        let catalog = Self::bootstrap(conn, config.path.clone(), config.batch_size)?;
        info!(
            path = %config.path.display(),
            batch_size = config.batch_size,
            duration_ms = started_at.elapsed().as_millis() as u64,
            "catalog opened"
        );
        Ok(catalog)
    }

    /// Open a throwaway in-memory catalog.
    pub fn open_in_memory(batch_size: usize) -> DbResult<Self> {
        let config = CatalogConfig::new(":memory:", batch_size);
        config.validate()?;
        Self::bootstrap(Connection::open_in_memory()?, config.path, batch_size)
    }

    fn bootstrap(conn: Connection, path: PathBuf, batch_size: usize) -> DbResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        apply_schema(&conn)?;
        Ok(Self { conn: Some(conn), path, batch_size })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    /// Expose the underlying connection for advanced callers.
    /// For most code, prefer higher-level helpers.
    pub fn connection(&self) -> DbResult<&Connection> {
        self.conn.as_ref().ok_or(DbError::Closed)
    }

    /// Release the handle. A second call reports [`DbError::Closed`].
    pub fn close(&mut self) -> DbResult<()> {
        let conn = self.conn.take().ok_or(DbError::Closed)?;
        conn.close().map_err(|(_, err)| DbError::Sql(err))?;
        info!(path = %self.path.display(), "catalog closed");
        Ok(())
    }

    // ========== Writers ==========

    /// Return the stored record sharing `candidate`'s natural key, inserting
    /// `candidate` if there is none. Repeated calls store exactly one row.
    pub fn create_or_find<E: Entity>(&self, candidate: E) -> DbResult<E> {
        let conn = self.connection()?;
        let (record, _) = find_or_insert(conn, candidate, &timestamp())?;
        Ok(record)
    }

    /// Create-or-find every candidate, committing one transaction per
    /// `batch_size` records.
    ///
    /// Not atomic as a whole: if a batch fails, earlier batches stay committed.
    /// Rerunning the same input is safe and converges on the same rows.
    pub fn create_or_find_all<E: Entity>(&self, candidates: Vec<E>) -> DbResult<Vec<E>> {
        let mut out = Vec::with_capacity(candidates.len());
        let mut created = 0usize;
        self.in_batches(candidates, |conn, now, candidate| {
            let (record, inserted) = find_or_insert(conn, candidate, now)?;
            created += usize::from(inserted);
            out.push(record);
            Ok(())
        })?;
        debug!(entity = E::KIND, total = out.len(), created, "create-or-find batch run finished");
        Ok(out)
    }

    /// Drive `f` over `items`, one transaction per `batch_size` items.
    /// Returns the number of committed batches.
    pub(crate) fn in_batches<T, F>(&self, items: impl IntoIterator<Item = T>, mut f: F) -> DbResult<usize>
    where
        F: FnMut(&Connection, &str, T) -> DbResult<()>,
    {
        let conn = self.connection()?;
        let mut items = items.into_iter().peekable();
        let mut batches = 0usize;
        while items.peek().is_some() {
            let tx = conn.unchecked_transaction()?;
            let now = timestamp();
            let mut rows = 0usize;
            for item in items.by_ref().take(self.batch_size) {
                f(&tx, &now, item)?;
                rows += 1;
            }
            tx.commit()?;
            batches += 1;
            debug!(batch = batches, rows, "batch committed");
        }
        Ok(batches)
    }

    /// Insert `record` if it has no identity, otherwise overwrite every
    /// caller-owned column of the stored row.
    pub fn save<E: Entity>(&self, record: &mut E) -> DbResult<()> {
        let conn = self.connection()?;
        let now = timestamp();
        if record.is_persisted() {
            record.overwrite(conn, &now)?;
        } else {
            record.insert(conn, &now)?;
        }
        Ok(())
    }

    // ========== Readers ==========

    pub fn get_artifact(&self, id: i64) -> DbResult<Artifact> {
        select_one(self.connection()?, "id = ?1", params![id])?
            .ok_or_else(|| DbError::not_found(Artifact::KIND, id))
    }

    pub fn get_artifact_by_name(&self, name: &str) -> DbResult<Artifact> {
        select_one(self.connection()?, "name = ?1", params![name])?
            .ok_or_else(|| DbError::not_found(Artifact::KIND, name))
    }

    /// List all artifacts (ordered by id).
    pub fn list_artifacts(&self) -> DbResult<Vec<Artifact>> {
        Ok(select_all(self.connection()?, "1 = 1 ORDER BY id", [])?)
    }

    pub fn devices_for_artifact(&self, artifact_id: i64) -> DbResult<Vec<Device>> {
        Ok(select_all(self.connection()?, "artifact_id = ?1 ORDER BY name", params![artifact_id])?)
    }

    pub fn kernelcache_for_artifact(&self, artifact_id: i64) -> DbResult<Kernelcache> {
        select_one(self.connection()?, "artifact_id = ?1", params![artifact_id])?
            .ok_or_else(|| DbError::not_found(Kernelcache::KIND, format!("artifact {artifact_id}")))
    }

    pub fn shared_caches_for_artifact(&self, artifact_id: i64) -> DbResult<Vec<SharedCache>> {
        Ok(select_all(self.connection()?, "artifact_id = ?1 ORDER BY id", params![artifact_id])?)
    }

    pub fn images_for_artifact(&self, artifact_id: i64) -> DbResult<Vec<BinaryImage>> {
        Ok(select_all(self.connection()?, "artifact_id = ?1 ORDER BY name", params![artifact_id])?)
    }

    pub fn get_image(&self, uuid: &str) -> DbResult<BinaryImage> {
        select_one(self.connection()?, "uuid = ?1", params![uuid])?
            .ok_or_else(|| DbError::not_found(BinaryImage::KIND, uuid))
    }

    /// All symbols linked to the image, ordered by start address.
    pub fn get_symbols_for_image(&self, uuid: &str) -> DbResult<Vec<Symbol>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare_cached(
            r#"
            SELECT s.id, s.name, s.start_addr, s.end_addr, s.created_at, s.updated_at
            FROM image_symbols l
            JOIN symbols s ON s.id = l.symbol_id
            WHERE l.image_uuid = ?1
            ORDER BY s.start_addr, s.id
            "#,
        )?;
        let rows = stmt.query_map(params![uuid], Symbol::from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        if out.is_empty() {
            return Err(DbError::not_found("symbols for image", uuid));
        }
        Ok(out)
    }

    /// Find the symbol of image `uuid` whose range `[start, end)` contains `address`.
    ///
    /// Candidates are restricted to the image before ranges are tested. When
    /// ranges overlap, the smallest range wins, then the lowest symbol id.
    pub fn resolve_symbol(&self, uuid: &str, address: u64) -> DbResult<Symbol> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare_cached(
            r#"
            SELECT s.id, s.name, s.start_addr, s.end_addr, s.created_at, s.updated_at
            FROM image_symbols l
            JOIN symbols s ON s.id = l.symbol_id
            WHERE l.image_uuid = ?1 AND s.start_addr <= ?2 AND ?2 < s.end_addr
            ORDER BY (s.end_addr - s.start_addr), s.id
            LIMIT 1
            "#,
        )?;
        let mut rows = stmt.query(params![uuid, addr_to_sql(address)])?;
        match rows.next()? {
            Some(row) => Ok(Symbol::from_row(row)?),
            None => Err(DbError::not_found(Symbol::KIND, format!("{uuid}@{address:#x}"))),
        }
    }

    /// Row counts per table.
    pub fn stats(&self) -> DbResult<CatalogStats> {
        let conn = self.connection()?;
        let count = |table: &str| -> DbResult<u64> {
            let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n as u64)
        };
        Ok(CatalogStats {
            artifacts: count(Artifact::TABLE)?,
            devices: count(Device::TABLE)?,
            kernelcaches: count(Kernelcache::TABLE)?,
            shared_caches: count(SharedCache::TABLE)?,
            images: count(BinaryImage::TABLE)?,
            symbols: count(Symbol::TABLE)?,
            image_symbols: count("image_symbols")?,
        })
    }

    // ========== Deleters ==========

    /// Remove one artifact row.
    ///
    /// Does not cascade: devices, caches and images stay, with their
    /// `artifact_id` cleared. A device whose name is already held by a
    /// detached device merges into that row instead of duplicating it.
    pub fn delete_artifact(&self, id: i64) -> DbResult<()> {
        let conn = self.connection()?;
        let tx = conn.unchecked_transaction()?;
        let merged = tx.execute(
            r#"
            DELETE FROM devices
            WHERE artifact_id = ?1
              AND name IN (SELECT name FROM devices WHERE artifact_id IS NULL)
            "#,
            params![id],
        )?;
        let affected = tx.execute("DELETE FROM artifacts WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(DbError::not_found(Artifact::KIND, id));
        }
        tx.commit()?;
        info!(artifact_id = id, merged_devices = merged, "artifact deleted");
        Ok(())
    }

    /// Delete interned symbols no image links to any more. Returns how many went.
    pub fn prune_orphan_symbols(&self) -> DbResult<usize> {
        let removed = self.connection()?.execute(
            r#"
            DELETE FROM symbols
            WHERE NOT EXISTS (SELECT 1 FROM image_symbols l WHERE l.symbol_id = symbols.id)
            "#,
            [],
        )?;
        info!(removed, "orphan symbols pruned");
        Ok(removed)
    }
}
