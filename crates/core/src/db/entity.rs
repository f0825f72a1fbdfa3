//! Per-entity natural keys and row mapping.
//!
//! Generic catalog writes (`create_or_find`, `save`) are parameterized over
//! [`Entity`]; each type states how to find itself by natural key, how to
//! insert itself, and how to overwrite its stored row.

use rusqlite::{params, Connection, OptionalExtension, Params, Row};

use crate::db::{
    Artifact, BinaryImage, Device, ImageSymbolLink, Kernelcache, SharedCache, Symbol,
};

const ADDR_BIAS: u64 = 1 << 63;

/// Map a `u64` address onto `i64` preserving order, so SQL range predicates
/// stay correct for addresses with the high bit set (kernel space).
pub(crate) fn addr_to_sql(addr: u64) -> i64 {
    (addr ^ ADDR_BIAS) as i64
}

pub(crate) fn addr_from_sql(value: i64) -> u64 {
    (value as u64) ^ ADDR_BIAS
}

/// A catalog record type.
pub trait Entity: Sized {
    /// Short name used in logs and not-found errors.
    const KIND: &'static str;
    const TABLE: &'static str;
    /// Column list, in the order `from_row` reads them.
    const COLUMNS: &'static str;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Look up the stored record sharing this candidate's natural key.
    fn find_existing(&self, conn: &Connection) -> rusqlite::Result<Option<Self>>;

    /// Insert as a new row, filling generated fields.
    fn insert(&mut self, conn: &Connection, now: &str) -> rusqlite::Result<()>;

    /// Whether the record carries a primary identity.
    fn is_persisted(&self) -> bool;

    /// Replace every caller-owned column of the row with this identity,
    /// inserting it if the row is gone. `created_at` is kept.
    fn overwrite(&mut self, conn: &Connection, now: &str) -> rusqlite::Result<()>;
}

pub(crate) fn select_one<E: Entity, P: Params>(
    conn: &Connection,
    clause: &str,
    params: P,
) -> rusqlite::Result<Option<E>> {
    let sql = format!("SELECT {} FROM {} WHERE {} LIMIT 1", E::COLUMNS, E::TABLE, clause);
    conn.prepare_cached(&sql)?.query_row(params, E::from_row).optional()
}

pub(crate) fn select_all<E: Entity, P: Params>(
    conn: &Connection,
    clause: &str,
    params: P,
) -> rusqlite::Result<Vec<E>> {
    let sql = format!("SELECT {} FROM {} WHERE {}", E::COLUMNS, E::TABLE, clause);
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(params, E::from_row)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Return the stored record for the candidate's natural key, inserting the
/// candidate first if there is none.
pub(crate) fn find_or_insert<E: Entity>(
    conn: &Connection,
    mut candidate: E,
    now: &str,
) -> rusqlite::Result<(E, bool)> {
    if let Some(existing) = candidate.find_existing(conn)? {
        return Ok((existing, false));
    }
    candidate.insert(conn, now)?;
    Ok((candidate, true))
}

impl Entity for Artifact {
    const KIND: &'static str = "artifact";
    const TABLE: &'static str = "artifacts";
    const COLUMNS: &'static str = "id, name, version, build_id, sha256, created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Artifact {
            id: row.get(0)?,
            name: row.get(1)?,
            version: row.get(2)?,
            build_id: row.get(3)?,
            sha256: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn find_existing(&self, conn: &Connection) -> rusqlite::Result<Option<Self>> {
        select_one(conn, "name = ?1", params![self.name])
    }

    fn insert(&mut self, conn: &Connection, now: &str) -> rusqlite::Result<()> {
        conn.prepare_cached(
            r#"
            INSERT INTO artifacts (name, version, build_id, sha256, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )?
        .execute(params![self.name, self.version, self.build_id, self.sha256, now])?;
        self.id = Some(conn.last_insert_rowid());
        self.created_at = Some(now.to_string());
        self.updated_at = Some(now.to_string());
        Ok(())
    }

    fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    fn overwrite(&mut self, conn: &Connection, now: &str) -> rusqlite::Result<()> {
        let created_at: String = conn.query_row(
            r#"
            INSERT INTO artifacts (id, name, version, build_id, sha256, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                version = excluded.version,
                build_id = excluded.build_id,
                sha256 = excluded.sha256,
                updated_at = excluded.updated_at
            RETURNING created_at
            "#,
            params![self.id, self.name, self.version, self.build_id, self.sha256, now],
            |row| row.get(0),
        )?;
        self.created_at = Some(created_at);
        self.updated_at = Some(now.to_string());
        Ok(())
    }
}

impl Entity for Device {
    const KIND: &'static str = "device";
    const TABLE: &'static str = "devices";
    const COLUMNS: &'static str = "id, artifact_id, name, board, created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Device {
            id: row.get(0)?,
            artifact_id: row.get(1)?,
            name: row.get(2)?,
            board: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn find_existing(&self, conn: &Connection) -> rusqlite::Result<Option<Self>> {
        // `IS` so that detached devices (NULL artifact) still dedup by name.
        select_one(conn, "artifact_id IS ?1 AND name = ?2", params![self.artifact_id, self.name])
    }

    fn insert(&mut self, conn: &Connection, now: &str) -> rusqlite::Result<()> {
        conn.prepare_cached(
            r#"
            INSERT INTO devices (artifact_id, name, board, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
        )?
        .execute(params![self.artifact_id, self.name, self.board, now])?;
        self.id = Some(conn.last_insert_rowid());
        self.created_at = Some(now.to_string());
        self.updated_at = Some(now.to_string());
        Ok(())
    }

    fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    fn overwrite(&mut self, conn: &Connection, now: &str) -> rusqlite::Result<()> {
        let created_at: String = conn.query_row(
            r#"
            INSERT INTO devices (id, artifact_id, name, board, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(id) DO UPDATE SET
                artifact_id = excluded.artifact_id,
                name = excluded.name,
                board = excluded.board,
                updated_at = excluded.updated_at
            RETURNING created_at
            "#,
            params![self.id, self.artifact_id, self.name, self.board, now],
            |row| row.get(0),
        )?;
        self.created_at = Some(created_at);
        self.updated_at = Some(now.to_string());
        Ok(())
    }
}

impl Entity for Kernelcache {
    const KIND: &'static str = "kernelcache";
    const TABLE: &'static str = "kernelcaches";
    const COLUMNS: &'static str = "id, artifact_id, uuid, version, created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Kernelcache {
            id: row.get(0)?,
            artifact_id: row.get(1)?,
            uuid: row.get(2)?,
            version: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn find_existing(&self, conn: &Connection) -> rusqlite::Result<Option<Self>> {
        select_one(conn, "uuid = ?1", params![self.uuid])
    }

    fn insert(&mut self, conn: &Connection, now: &str) -> rusqlite::Result<()> {
        conn.prepare_cached(
            r#"
            INSERT INTO kernelcaches (artifact_id, uuid, version, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
        )?
        .execute(params![self.artifact_id, self.uuid, self.version, now])?;
        self.id = Some(conn.last_insert_rowid());
        self.created_at = Some(now.to_string());
        self.updated_at = Some(now.to_string());
        Ok(())
    }

    fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    fn overwrite(&mut self, conn: &Connection, now: &str) -> rusqlite::Result<()> {
        let created_at: String = conn.query_row(
            r#"
            INSERT INTO kernelcaches (id, artifact_id, uuid, version, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(id) DO UPDATE SET
                artifact_id = excluded.artifact_id,
                uuid = excluded.uuid,
                version = excluded.version,
                updated_at = excluded.updated_at
            RETURNING created_at
            "#,
            params![self.id, self.artifact_id, self.uuid, self.version, now],
            |row| row.get(0),
        )?;
        self.created_at = Some(created_at);
        self.updated_at = Some(now.to_string());
        Ok(())
    }
}

impl Entity for SharedCache {
    const KIND: &'static str = "shared cache";
    const TABLE: &'static str = "shared_caches";
    const COLUMNS: &'static str =
        "id, artifact_id, uuid, platform, shared_region_start, created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(SharedCache {
            id: row.get(0)?,
            artifact_id: row.get(1)?,
            uuid: row.get(2)?,
            platform: row.get(3)?,
            shared_region_start: addr_from_sql(row.get(4)?),
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn find_existing(&self, conn: &Connection) -> rusqlite::Result<Option<Self>> {
        select_one(conn, "uuid = ?1", params![self.uuid])
    }

    fn insert(&mut self, conn: &Connection, now: &str) -> rusqlite::Result<()> {
        conn.prepare_cached(
            r#"
            INSERT INTO shared_caches (artifact_id, uuid, platform, shared_region_start, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )?
        .execute(params![
            self.artifact_id,
            self.uuid,
            self.platform,
            addr_to_sql(self.shared_region_start),
            now
        ])?;
        self.id = Some(conn.last_insert_rowid());
        self.created_at = Some(now.to_string());
        self.updated_at = Some(now.to_string());
        Ok(())
    }

    fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    fn overwrite(&mut self, conn: &Connection, now: &str) -> rusqlite::Result<()> {
        let created_at: String = conn.query_row(
            r#"
            INSERT INTO shared_caches (id, artifact_id, uuid, platform, shared_region_start, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(id) DO UPDATE SET
                artifact_id = excluded.artifact_id,
                uuid = excluded.uuid,
                platform = excluded.platform,
                shared_region_start = excluded.shared_region_start,
                updated_at = excluded.updated_at
            RETURNING created_at
            "#,
            params![
                self.id,
                self.artifact_id,
                self.uuid,
                self.platform,
                addr_to_sql(self.shared_region_start),
                now
            ],
            |row| row.get(0),
        )?;
        self.created_at = Some(created_at);
        self.updated_at = Some(now.to_string());
        Ok(())
    }
}

impl Entity for BinaryImage {
    const KIND: &'static str = "image";
    const TABLE: &'static str = "images";
    const COLUMNS: &'static str = "uuid, name, text_start, text_end, artifact_id, kernelcache_id, shared_cache_id, created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(BinaryImage {
            uuid: row.get(0)?,
            name: row.get(1)?,
            text_start: addr_from_sql(row.get(2)?),
            text_end: addr_from_sql(row.get(3)?),
            artifact_id: row.get(4)?,
            kernelcache_id: row.get(5)?,
            shared_cache_id: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn find_existing(&self, conn: &Connection) -> rusqlite::Result<Option<Self>> {
        select_one(conn, "uuid = ?1", params![self.uuid])
    }

    fn insert(&mut self, conn: &Connection, now: &str) -> rusqlite::Result<()> {
        conn.prepare_cached(
            r#"
            INSERT INTO images (uuid, name, text_start, text_end, artifact_id, kernelcache_id, shared_cache_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            "#,
        )?
        .execute(params![
            self.uuid,
            self.name,
            addr_to_sql(self.text_start),
            addr_to_sql(self.text_end),
            self.artifact_id,
            self.kernelcache_id,
            self.shared_cache_id,
            now
        ])?;
        self.created_at = Some(now.to_string());
        self.updated_at = Some(now.to_string());
        Ok(())
    }

    /// The UUID is caller-assigned, so an image always carries its identity.
    fn is_persisted(&self) -> bool {
        true
    }

    fn overwrite(&mut self, conn: &Connection, now: &str) -> rusqlite::Result<()> {
        let created_at: String = conn.query_row(
            r#"
            INSERT INTO images (uuid, name, text_start, text_end, artifact_id, kernelcache_id, shared_cache_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            ON CONFLICT(uuid) DO UPDATE SET
                name = excluded.name,
                text_start = excluded.text_start,
                text_end = excluded.text_end,
                artifact_id = excluded.artifact_id,
                kernelcache_id = excluded.kernelcache_id,
                shared_cache_id = excluded.shared_cache_id,
                updated_at = excluded.updated_at
            RETURNING created_at
            "#,
            params![
                self.uuid,
                self.name,
                addr_to_sql(self.text_start),
                addr_to_sql(self.text_end),
                self.artifact_id,
                self.kernelcache_id,
                self.shared_cache_id,
                now
            ],
            |row| row.get(0),
        )?;
        self.created_at = Some(created_at);
        self.updated_at = Some(now.to_string());
        Ok(())
    }
}

impl Entity for Symbol {
    const KIND: &'static str = "symbol";
    const TABLE: &'static str = "symbols";
    const COLUMNS: &'static str = "id, name, start_addr, end_addr, created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Symbol {
            id: row.get(0)?,
            name: row.get(1)?,
            start: addr_from_sql(row.get(2)?),
            end: addr_from_sql(row.get(3)?),
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn find_existing(&self, conn: &Connection) -> rusqlite::Result<Option<Self>> {
        select_one(
            conn,
            "name = ?1 AND start_addr = ?2 AND end_addr = ?3",
            params![self.name, addr_to_sql(self.start), addr_to_sql(self.end)],
        )
    }

    fn insert(&mut self, conn: &Connection, now: &str) -> rusqlite::Result<()> {
        conn.prepare_cached(
            r#"
            INSERT INTO symbols (name, start_addr, end_addr, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
        )?
        .execute(params![self.name, addr_to_sql(self.start), addr_to_sql(self.end), now])?;
        self.id = Some(conn.last_insert_rowid());
        self.created_at = Some(now.to_string());
        self.updated_at = Some(now.to_string());
        Ok(())
    }

    fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    fn overwrite(&mut self, conn: &Connection, now: &str) -> rusqlite::Result<()> {
        let created_at: String = conn.query_row(
            r#"
            INSERT INTO symbols (id, name, start_addr, end_addr, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                start_addr = excluded.start_addr,
                end_addr = excluded.end_addr,
                updated_at = excluded.updated_at
            RETURNING created_at
            "#,
            params![self.id, self.name, addr_to_sql(self.start), addr_to_sql(self.end), now],
            |row| row.get(0),
        )?;
        self.created_at = Some(created_at);
        self.updated_at = Some(now.to_string());
        Ok(())
    }
}

impl Entity for ImageSymbolLink {
    const KIND: &'static str = "image symbol link";
    const TABLE: &'static str = "image_symbols";
    const COLUMNS: &'static str = "image_uuid, symbol_id";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ImageSymbolLink { image_uuid: row.get(0)?, symbol_id: row.get(1)? })
    }

    fn find_existing(&self, conn: &Connection) -> rusqlite::Result<Option<Self>> {
        select_one(conn, "image_uuid = ?1 AND symbol_id = ?2", params![self.image_uuid, self.symbol_id])
    }

    fn insert(&mut self, conn: &Connection, _now: &str) -> rusqlite::Result<()> {
        conn.prepare_cached("INSERT INTO image_symbols (image_uuid, symbol_id) VALUES (?1, ?2)")?
            .execute(params![self.image_uuid, self.symbol_id])?;
        Ok(())
    }

    /// Both columns form the key; there is nothing else to overwrite.
    fn is_persisted(&self) -> bool {
        true
    }

    fn overwrite(&mut self, conn: &Connection, _now: &str) -> rusqlite::Result<()> {
        conn.prepare_cached(
            "INSERT OR IGNORE INTO image_symbols (image_uuid, symbol_id) VALUES (?1, ?2)",
        )?
        .execute(params![self.image_uuid, self.symbol_id])?;
        Ok(())
    }
}
