//! Cold tier: durable facts with access tracking, archival, restore, purge.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde_json::Value;
use tracing::warn;

use memory_core::{ArchivedFact, MemoryError, MemoryResult, StoredFact};

use crate::engine::StorageEngine;

pub fn store_fact(
    engine: &StorageEngine,
    predicate: &str,
    args: &[Value],
    fact_type: &str,
    priority: i64,
) -> MemoryResult<i64> {
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        let args_json = serde_json::to_string(args)?;
        conn.execute(
            "INSERT INTO cold_storage (predicate, args, fact_type, priority) VALUES (?1, ?2, ?3, ?4)",
            params![predicate, args_json, fact_type, priority],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// All facts matching `predicate`. As a single transaction, touches
/// `last_accessed` and increments `access_count` on every returned row.
pub fn load_facts(engine: &StorageEngine, predicate: &str) -> MemoryResult<Vec<StoredFact>> {
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        conn.execute_batch("BEGIN IMMEDIATE")?;
        let result = (|| -> MemoryResult<Vec<StoredFact>> {
            let mut stmt = conn.prepare(
                "SELECT id, predicate, args, fact_type, priority, created_at, last_accessed, access_count
                 FROM cold_storage WHERE predicate = ?1",
            )?;
            let ids: Vec<i64> = stmt
                .query_map(params![predicate], |row| row.get(0))?
                .collect::<Result<_, _>>()?;
            drop(stmt);

            conn.execute(
                "UPDATE cold_storage SET last_accessed = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                 access_count = access_count + 1 WHERE predicate = ?1",
                params![predicate],
            )?;

            let mut stmt = conn.prepare(
                "SELECT id, predicate, args, fact_type, priority, created_at, last_accessed, access_count
                 FROM cold_storage WHERE id IN (SELECT value FROM json_each(?1))",
            )?;
            let ids_json = serde_json::to_string(&ids)?;
            let rows = stmt.query_map(params![ids_json], row_to_fact)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })();

        match result {
            Ok(facts) => {
                conn.execute_batch("COMMIT")?;
                Ok(facts)
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    })
}

fn row_to_fact(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredFact> {
    let id: i64 = row.get(0)?;
    let args_json: String = row.get(2)?;
    let args: Vec<Value> = serde_json::from_str(&args_json).unwrap_or_else(|e| {
        warn!(id, error = %e, "malformed cold_storage args, treating row as having no args");
        Vec::new()
    });
    Ok(StoredFact {
        id,
        predicate: row.get(1)?,
        args,
        fact_type: row.get(3)?,
        priority: row.get(4)?,
        created_at: parse_dt(&row.get::<_, String>(5)?),
        last_accessed: parse_dt(&row.get::<_, String>(6)?),
        access_count: row.get(7)?,
    })
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Archive facts untouched for `older_than_days` with `access_count` at
/// most `max_access`. Both boundaries are inclusive. Single transaction.
pub fn archive_old_facts(
    engine: &StorageEngine,
    older_than_days: i64,
    max_access: i64,
) -> MemoryResult<i64> {
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        conn.execute_batch("BEGIN IMMEDIATE")?;
        let result = (|| -> MemoryResult<i64> {
            conn.execute(
                "INSERT INTO archived_facts (predicate, args, fact_type, archived_at)
                 SELECT predicate, args, fact_type, strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 FROM cold_storage
                 WHERE last_accessed <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1) AND access_count <= ?2",
                params![format!("-{older_than_days} days"), max_access],
            )?;
            let n = conn.execute(
                "DELETE FROM cold_storage
                 WHERE last_accessed <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1) AND access_count <= ?2",
                params![format!("-{older_than_days} days"), max_access],
            )?;
            Ok(n as i64)
        })();

        match result {
            Ok(n) => {
                conn.execute_batch("COMMIT")?;
                Ok(n)
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    })
}

pub fn purge_old_archived_facts(engine: &StorageEngine, older_than_days: i64) -> MemoryResult<i64> {
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        let n = conn.execute(
            "DELETE FROM archived_facts WHERE archived_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1)",
            params![format!("-{older_than_days} days")],
        )?;
        Ok(n as i64)
    })
}

pub fn get_archived_facts(engine: &StorageEngine, predicate: &str) -> MemoryResult<Vec<ArchivedFact>> {
    let _guard = engine.read();
    engine.pool().with_reader(|conn| {
        let mut stmt = conn.prepare(
            "SELECT predicate, args, fact_type, archived_at FROM archived_facts WHERE predicate = ?1",
        )?;
        let rows = stmt.query_map(params![predicate], |row| {
            let predicate: String = row.get(0)?;
            let args_json: String = row.get(1)?;
            let archived_at: String = row.get(3)?;
            let args: Vec<Value> = serde_json::from_str(&args_json).unwrap_or_else(|e| {
                warn!(predicate, error = %e, "malformed archived_facts args, treating row as having no args");
                Vec::new()
            });
            Ok(ArchivedFact {
                predicate,
                args,
                fact_type: row.get(2)?,
                archived_at: parse_dt(&archived_at),
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    })
}

/// Move a fact back into `cold_storage` with a fresh `created_at` and
/// `access_count` reset to zero (the archive keeps no access history to
/// restore). Single transaction covering both tables.
pub fn restore_archived_fact(
    engine: &StorageEngine,
    predicate: &str,
    args: &[Value],
) -> MemoryResult<()> {
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        let args_json = serde_json::to_string(args)?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        let result = (|| -> MemoryResult<()> {
            let fact_type: Option<String> = conn
                .query_row(
                    "SELECT fact_type FROM archived_facts WHERE predicate = ?1 AND args = ?2",
                    params![predicate, args_json],
                    |row| row.get(0),
                )
                .ok();
            let Some(fact_type) = fact_type else {
                return Err(MemoryError::NotFound(format!(
                    "archived fact not found: {predicate}"
                )));
            };
            conn.execute(
                "DELETE FROM archived_facts WHERE predicate = ?1 AND args = ?2",
                params![predicate, args_json],
            )?;
            conn.execute(
                "INSERT INTO cold_storage (predicate, args, fact_type, priority) VALUES (?1, ?2, ?3, 0)",
                params![predicate, args_json, fact_type],
            )?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                conn.execute_batch("COMMIT")?;
                Ok(())
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    })
}
