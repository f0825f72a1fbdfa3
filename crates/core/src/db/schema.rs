//! Catalog schema declarations and the migration routine.
//!
//! Tables are declared as data. `apply_schema` brings any file up to the
//! current declarations: missing tables are created, declared columns missing
//! from existing tables are added, indexes are (re)created, and
//! `PRAGMA user_version` is bumped. It runs on every open and is idempotent.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::db::{DbError, DbResult};

/// Minimum schema version we know how to handle.
///
/// `0` means "no schema yet" (fresh DB).
pub const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 0;

/// Latest schema version this crate knows about.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    /// Type and column constraints, as written after the name.
    pub decl: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    /// Table constraints (UNIQUE, CHECK, composite keys).
    pub constraints: &'static [&'static str],
}

impl TableDef {
    pub fn create_sql(&self) -> String {
        let mut parts: Vec<String> =
            self.columns.iter().map(|c| format!("{} {}", c.name, c.decl)).collect();
        parts.extend(self.constraints.iter().map(|c| c.to_string()));
        format!("CREATE TABLE IF NOT EXISTS {} (\n    {}\n)", self.name, parts.join(",\n    "))
    }
}

const fn col(name: &'static str, decl: &'static str) -> ColumnDef {
    ColumnDef { name, decl }
}

pub const ARTIFACTS: TableDef = TableDef {
    name: "artifacts",
    columns: &[
        col("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
        col("name", "TEXT NOT NULL UNIQUE"),
        col("version", "TEXT"),
        col("build_id", "TEXT"),
        col("sha256", "TEXT"),
        col("created_at", "TEXT NOT NULL"),
        col("updated_at", "TEXT NOT NULL"),
    ],
    constraints: &[],
};

pub const DEVICES: TableDef = TableDef {
    name: "devices",
    columns: &[
        col("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
        col("artifact_id", "INTEGER REFERENCES artifacts(id) ON DELETE SET NULL"),
        col("name", "TEXT NOT NULL"),
        col("board", "TEXT"),
        col("created_at", "TEXT NOT NULL"),
        col("updated_at", "TEXT NOT NULL"),
    ],
    // Natural key is enforced by `idx_devices_natural_key`; a plain UNIQUE
    // treats NULL artifact ids as distinct.
    constraints: &[],
};

pub const KERNELCACHES: TableDef = TableDef {
    name: "kernelcaches",
    columns: &[
        col("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
        col("artifact_id", "INTEGER UNIQUE REFERENCES artifacts(id) ON DELETE SET NULL"),
        col("uuid", "TEXT NOT NULL UNIQUE"),
        col("version", "TEXT"),
        col("created_at", "TEXT NOT NULL"),
        col("updated_at", "TEXT NOT NULL"),
    ],
    constraints: &[],
};

pub const SHARED_CACHES: TableDef = TableDef {
    name: "shared_caches",
    columns: &[
        col("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
        col("artifact_id", "INTEGER REFERENCES artifacts(id) ON DELETE SET NULL"),
        col("uuid", "TEXT NOT NULL UNIQUE"),
        col("platform", "TEXT"),
        col("shared_region_start", "INTEGER NOT NULL"),
        col("created_at", "TEXT NOT NULL"),
        col("updated_at", "TEXT NOT NULL"),
    ],
    constraints: &[],
};

pub const IMAGES: TableDef = TableDef {
    name: "images",
    columns: &[
        col("uuid", "TEXT PRIMARY KEY NOT NULL"),
        col("name", "TEXT NOT NULL"),
        col("text_start", "INTEGER NOT NULL"),
        col("text_end", "INTEGER NOT NULL"),
        col("artifact_id", "INTEGER REFERENCES artifacts(id) ON DELETE SET NULL"),
        col("kernelcache_id", "INTEGER REFERENCES kernelcaches(id) ON DELETE SET NULL"),
        col("shared_cache_id", "INTEGER REFERENCES shared_caches(id) ON DELETE SET NULL"),
        col("created_at", "TEXT NOT NULL"),
        col("updated_at", "TEXT NOT NULL"),
    ],
    constraints: &[],
};

pub const SYMBOLS: TableDef = TableDef {
    name: "symbols",
    columns: &[
        col("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
        col("name", "TEXT NOT NULL"),
        col("start_addr", "INTEGER NOT NULL"),
        col("end_addr", "INTEGER NOT NULL"),
        col("created_at", "TEXT NOT NULL"),
        col("updated_at", "TEXT NOT NULL"),
    ],
    constraints: &["UNIQUE(name, start_addr, end_addr)", "CHECK(start_addr <= end_addr)"],
};

pub const IMAGE_SYMBOLS: TableDef = TableDef {
    name: "image_symbols",
    columns: &[
        col("image_uuid", "TEXT NOT NULL REFERENCES images(uuid) ON DELETE CASCADE"),
        col("symbol_id", "INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE"),
    ],
    constraints: &["PRIMARY KEY(image_uuid, symbol_id)"],
};

/// All tables, in dependency order.
pub const TABLES: &[TableDef] =
    &[ARTIFACTS, DEVICES, KERNELCACHES, SHARED_CACHES, IMAGES, SYMBOLS, IMAGE_SYMBOLS];

pub const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_devices_artifact ON devices(artifact_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_devices_natural_key ON devices(IFNULL(artifact_id, -1), name)",
    "CREATE INDEX IF NOT EXISTS idx_shared_caches_artifact ON shared_caches(artifact_id)",
    "CREATE INDEX IF NOT EXISTS idx_images_artifact ON images(artifact_id)",
    "CREATE INDEX IF NOT EXISTS idx_images_kernelcache ON images(kernelcache_id)",
    "CREATE INDEX IF NOT EXISTS idx_images_shared_cache ON images(shared_cache_id)",
    "CREATE INDEX IF NOT EXISTS idx_symbols_range ON symbols(start_addr, end_addr)",
    "CREATE INDEX IF NOT EXISTS idx_image_symbols_symbol ON image_symbols(symbol_id)",
];

/// Bring the database up to the current schema.
///
/// Runs in a single transaction; a failure leaves the file as it was and the
/// handle must not be used.
pub fn apply_schema(conn: &Connection) -> DbResult<()> {
    let current_version = current_schema_version(conn)?;

    // Reject DBs created with a newer schema than we support.
    if current_version > CURRENT_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            found: current_version,
            min_supported: MIN_SUPPORTED_SCHEMA_VERSION,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    let tx = conn.unchecked_transaction()?;
    let mut added_columns = 0usize;
    for table in TABLES {
        tx.execute(&table.create_sql(), [])?;
        for column in table.columns {
            if !column_exists(&tx, table.name, column.name)? {
                debug!(table = table.name, column = column.name, "adding missing column");
                tx.execute(
                    &format!("ALTER TABLE {} ADD COLUMN {} {}", table.name, column.name, column.decl),
                    [],
                )?;
                added_columns += 1;
            }
        }
    }
    for stmt in INDEXES {
        tx.execute(stmt, [])?;
    }
    if current_version != CURRENT_SCHEMA_VERSION {
        tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    }
    tx.commit()?;

    if current_version != CURRENT_SCHEMA_VERSION || added_columns > 0 {
        info!(
            from = current_version,
            to = CURRENT_SCHEMA_VERSION,
            added_columns,
            "catalog schema migrated"
        );
    }
    Ok(())
}

/// Read the SQLite schema version from `PRAGMA user_version`.
pub fn current_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> DbResult<bool> {
    let pragma = format!("PRAGMA table_info({table});");
    let mut stmt = conn.prepare(&pragma)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in rows {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}
