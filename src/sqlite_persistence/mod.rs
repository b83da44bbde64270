mod versioned_schema;

pub use versioned_schema::*;

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Opens (or creates) a database governed by `schema`.
///
/// A missing file is created with the schema. An existing file must carry the
/// schema's version and is validated against it.
pub fn open_versioned<P: AsRef<Path>>(
    db_path: P,
    schema: &VersionedSchema,
    busy_timeout: Duration,
) -> Result<Connection> {
    let path = db_path.as_ref();
    let is_new_db = !path.exists();

    let conn =
        Connection::open(path).with_context(|| format!("Failed to open database {:?}", path))?;
    conn.busy_timeout(busy_timeout)?;
    conn.execute("PRAGMA foreign_keys = ON;", [])?;

    if is_new_db {
        info!("Creating new database at {:?} (version {})", path, schema.version);
        schema.create(&conn)?;
        return Ok(conn);
    }

    let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let db_version = raw_version - BASE_DB_VERSION as i64;
    if db_version != schema.version as i64 {
        bail!(
            "Database {:?} has version {}, expected {}",
            path,
            db_version,
            schema.version
        );
    }
    schema
        .validate(&conn)
        .with_context(|| format!("Schema validation failed for version {}", db_version))?;

    Ok(conn)
}
