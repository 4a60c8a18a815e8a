//! Migration runner — version tracking, forward-only, transactional per
//! migration. Generic over a caller-supplied migration table so the same
//! runner drives both the main store's schema and each per-shard learning
//! database.

mod v001_initial_schema;
mod v002_embedding_columns;
mod v003_vector_index;
mod v004_content_hash;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use memory_core::{MemoryError, MemoryResult, MigrationResult};

pub type MigrationFn = fn(&Connection) -> MemoryResult<()>;

/// The main store's migration table, applied by [`crate::engine::StorageEngine::open`].
pub const LATEST_VERSION: u32 = 4;

pub const MIGRATIONS: [(u32, &str, MigrationFn); 4] = [
    (1, "initial_schema", v001_initial_schema::migrate),
    (2, "embedding_columns", v002_embedding_columns::migrate),
    (3, "vector_index", v003_vector_index::migrate),
    (4, "content_hash", v004_content_hash::migrate),
];

/// Current schema version; 0 if the `schema_version` table doesn't exist.
pub fn current_version(conn: &Connection) -> MemoryResult<u32> {
    let exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version'")
        .and_then(|mut stmt| stmt.exists([]))?;
    if !exists {
        return Ok(0);
    }
    let version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Run every migration in `migrations` whose version exceeds the database's
/// current version, in order, each wrapped in its own transaction. Returns a
/// [`MigrationResult`] reporting the version span and how many applied; a
/// partial failure rolls back the offending migration and surfaces
/// `MigrationFailed` instead of returning a result.
pub fn run_migrations(
    conn: &Connection,
    migrations: &[(u32, &str, MigrationFn)],
    latest_version: u32,
) -> MemoryResult<MigrationResult> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );",
    )?;

    let from_version = current_version(conn)?;

    if from_version >= latest_version {
        debug!("database schema is up to date (v{from_version})");
        return Ok(MigrationResult {
            from_version,
            to_version: from_version,
            applied: 0,
        });
    }

    info!("running migrations: v{from_version} -> v{latest_version}");
    let mut applied = 0;

    for &(version, name, migrate_fn) in migrations {
        if version <= from_version {
            continue;
        }

        debug!("applying migration v{version:03}: {name}");
        conn.execute_batch("BEGIN IMMEDIATE")?;

        match migrate_fn(conn) {
            Ok(()) => {
                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?1)",
                    [version],
                )?;
                conn.execute_batch("COMMIT")?;
                info!("applied migration v{version:03}: {name}");
                applied += 1;
            }
            Err(e) => {
                warn!("migration v{version:03} failed: {e}, rolling back");
                let _ = conn.execute_batch("ROLLBACK");
                return Err(MemoryError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!("applied {applied} migration(s), now at v{latest_version}");
    Ok(MigrationResult {
        from_version,
        to_version: latest_version,
        applied,
    })
}
