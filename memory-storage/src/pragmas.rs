//! SQLite PRAGMA configuration, applied to every connection immediately
//! after opening.

use rusqlite::Connection;

use memory_core::MemoryResult;

/// Production-grade PRAGMAs: WAL for concurrent readers during writes,
/// `busy_timeout` as the primary lock-contention mechanism, mmap for
/// faster large-table reads, NORMAL synchronous as the WAL durability
/// trade-off.
pub fn configure_connection(conn: &Connection) -> MemoryResult<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        PRAGMA cache_size = -8000;
        PRAGMA mmap_size = 268435456;
        PRAGMA temp_store = MEMORY;
        ",
    )?;
    Ok(())
}

/// Same PRAGMAs as [`configure_connection`] plus `query_only = ON` so a
/// reader connection cannot accidentally take a write lock.
pub fn configure_readonly_connection(conn: &Connection) -> MemoryResult<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        PRAGMA cache_size = -8000;
        PRAGMA mmap_size = 268435456;
        PRAGMA temp_store = MEMORY;
        PRAGMA query_only = ON;
        ",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_busy_timeout() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn).unwrap();
        let timeout: i64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, 5000);
    }

    #[test]
    fn sets_foreign_keys() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn).unwrap();
        let fk: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn readonly_connection_rejects_writes() {
        let conn = Connection::open_in_memory().unwrap();
        configure_readonly_connection(&conn).unwrap();
        let query_only: i64 = conn
            .pragma_query_value(None, "query_only", |row| row.get(0))
            .unwrap();
        assert_eq!(query_only, 1);
    }
}
