//! Composes the cold-tier sweep, activation-log pruning, and an optional
//! vacuum into the single periodic `maintenance_cleanup` entry point.

use tracing::info;

use memory_core::{MaintenanceConfig, MaintenanceStats, MemoryResult};

use crate::engine::StorageEngine;
use crate::queries::fact_ops;

pub fn maintenance_cleanup(
    engine: &StorageEngine,
    config: &MaintenanceConfig,
) -> MemoryResult<MaintenanceStats> {
    let facts_archived = fact_ops::archive_old_facts(
        engine,
        config.archive_older_than_days,
        config.max_access_count,
    )?;
    let facts_purged =
        fact_ops::purge_old_archived_facts(engine, config.purge_archived_older_than_days)?;
    let activations_pruned = clean_activation_log(engine, config.clean_activation_log_days)?;

    let vacuumed = if config.vacuum_database {
        full_vacuum(engine)?;
        true
    } else {
        false
    };

    info!(
        facts_archived,
        facts_purged, activations_pruned, vacuumed, "maintenance sweep finished"
    );

    Ok(MaintenanceStats {
        facts_archived,
        facts_purged,
        activations_pruned,
        vacuumed,
    })
}

fn clean_activation_log(engine: &StorageEngine, older_than_days: i64) -> MemoryResult<i64> {
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        let n = conn.execute(
            "DELETE FROM activation_log WHERE timestamp <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1)",
            rusqlite::params![format!("-{older_than_days} days")],
        )?;
        Ok(n as i64)
    })
}

/// Reclaims free pages; rebuilds the whole database file. Exclusive.
pub fn full_vacuum(engine: &StorageEngine) -> MemoryResult<()> {
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        conn.execute_batch("VACUUM;")?;
        Ok(())
    })
}

/// Incremental vacuum, bounded to `pages` freelist pages — cheaper than a
/// full vacuum, requires `PRAGMA auto_vacuum = INCREMENTAL` to have taken
/// effect at database creation time to do anything.
pub fn incremental_vacuum(engine: &StorageEngine, pages: i64) -> MemoryResult<()> {
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        conn.execute_batch(&format!("PRAGMA incremental_vacuum({pages});"))?;
        Ok(())
    })
}

pub fn wal_checkpoint(engine: &StorageEngine) -> MemoryResult<()> {
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    })
}

pub fn integrity_check(engine: &StorageEngine) -> MemoryResult<bool> {
    let _guard = engine.read();
    engine.pool().with_reader(|conn| {
        let result: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_check_passes_on_fresh_db() {
        let engine = StorageEngine::open_in_memory().unwrap();
        assert!(integrity_check(&engine).unwrap());
    }

    #[test]
    fn maintenance_cleanup_reports_counts() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let stats = maintenance_cleanup(&engine, &MaintenanceConfig::default()).unwrap();
        assert_eq!(stats.facts_archived, 0);
        assert!(!stats.vacuumed);
    }
}
