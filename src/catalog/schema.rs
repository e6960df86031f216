//! SQLite schema and connection setup.
//!
//! The catalog is a single SQLite file in WAL mode, so readers keep working
//! while a write transaction is open. `PRAGMA user_version` carries the
//! schema version; a file written by a newer version is refused rather than
//! silently misread.

use super::CatalogError;
use rusqlite::{Connection, ErrorCode};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const SCHEMA_VERSION: i64 = 1;

const BUSY_TIMEOUT: Duration = Duration::from_millis(1500);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS assets (
    id      TEXT PRIMARY KEY NOT NULL,
    origin  INTEGER NOT NULL,
    name    TEXT NOT NULL,
    uti     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS metadata (
    asset_id    TEXT PRIMARY KEY NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
    width       INTEGER NOT NULL,
    height      INTEGER NOT NULL,
    orientation INTEGER NOT NULL,
    tiff        TEXT,
    exif        TEXT,
    exif_aux    TEXT,
    latitude    REAL,
    longitude   REAL,
    histogram   BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS representations (
    id      TEXT PRIMARY KEY NOT NULL
);

-- The type belongs to the link: identical bytes can be one asset's
-- thumbnail and another asset's original.
CREATE TABLE IF NOT EXISTS asset_representations (
    asset_id            TEXT NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
    representation_id   TEXT NOT NULL REFERENCES representations(id),
    type                INTEGER NOT NULL,
    position            INTEGER NOT NULL,
    PRIMARY KEY (asset_id, type)
);

CREATE TABLE IF NOT EXISTS tags (
    name    TEXT PRIMARY KEY NOT NULL,
    type    INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS asset_tags (
    asset_id    TEXT NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
    tag_name    TEXT NOT NULL REFERENCES tags(name),
    PRIMARY KEY (asset_id, tag_name)
);

CREATE INDEX IF NOT EXISTS idx_assets_name ON assets(name);
CREATE INDEX IF NOT EXISTS idx_asset_tags_tag ON asset_tags(tag_name);
CREATE INDEX IF NOT EXISTS idx_asset_representations_rep ON asset_representations(representation_id);
";

/// Open a connection and apply per-connection settings.
pub(crate) fn connect(path: &Path) -> Result<Connection, CatalogError> {
    let conn = Connection::open(path).map_err(|e| classify(path, e))?;
    configure(&conn).map_err(|e| classify(path, e))?;
    Ok(conn)
}

fn configure(conn: &Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!(journal_mode = %mode, "configured catalog connection");
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

const TABLES: [&str; 6] = [
    "asset_representations",
    "asset_tags",
    "assets",
    "metadata",
    "representations",
    "tags",
];

/// Create the tables on a fresh file, or check the version and tables of an
/// existing one. A database holding anything else is refused.
pub(crate) fn migrate(conn: &mut Connection, path: &Path) -> Result<(), CatalogError> {
    let invalid = |reason: String| CatalogError::InvalidFile {
        path: path.to_path_buf(),
        reason,
    };
    let version: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| classify(path, e))?;
    let tables = user_tables(conn).map_err(|e| classify(path, e))?;

    if version > SCHEMA_VERSION {
        return Err(invalid(format!(
            "schema version {version} is newer than supported {SCHEMA_VERSION}"
        )));
    }
    if version == SCHEMA_VERSION {
        if let Some(missing) = TABLES.iter().find(|t| !tables.iter().any(|n| n == *t)) {
            return Err(invalid(format!("missing table {missing}")));
        }
        return Ok(());
    }
    if !tables.is_empty() {
        return Err(invalid(format!(
            "not a photoflow catalog (contains {})",
            tables.join(", ")
        )));
    }

    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA)?;
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;
    debug!(path = %path.display(), version = SCHEMA_VERSION, "initialized catalog schema");
    Ok(())
}

fn user_tables(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    stmt.query_map([], |row| row.get(0))?.collect()
}

/// Errors that mean "this is not a usable catalog file" become
/// [`CatalogError::InvalidFile`]; everything else stays a database error.
pub(crate) fn classify(path: &Path, err: rusqlite::Error) -> CatalogError {
    let invalid = matches!(
        err.sqlite_error_code(),
        Some(
            ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::CannotOpen
                | ErrorCode::ReadOnly
        )
    );
    if invalid {
        CatalogError::InvalidFile {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    } else {
        CatalogError::Database(err)
    }
}
