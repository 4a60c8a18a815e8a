//! `ConnectionPool` — one writer connection plus a round-robin pool of
//! read-only connections, all WAL-mode.
//!
//! This is the only place that holds `Mutex<Connection>`; every tier query
//! module reaches a physical connection through `with_writer`/`with_reader`.
//! The pool by itself does not implement the process-local read-write lock
//! described at the engine level — see [`crate::engine::StorageEngine`] for
//! the gate that gives callers a true shared/exclusive discipline on top of
//! these physical connections.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rusqlite::Connection;

use memory_core::{MemoryError, MemoryResult};

use crate::pragmas;

const DEFAULT_READ_POOL_SIZE: usize = 2;

pub struct ConnectionPool {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    read_index: AtomicUsize,
}

impl ConnectionPool {
    /// Open a file-backed pool: one read-write writer, `read_pool_size`
    /// read-only readers (0 maps to [`DEFAULT_READ_POOL_SIZE`]).
    pub fn open(path: &Path, read_pool_size: usize) -> MemoryResult<Self> {
        let pool_size = if read_pool_size == 0 {
            DEFAULT_READ_POOL_SIZE
        } else {
            read_pool_size
        };

        let writer = Connection::open(path)?;
        pragmas::configure_connection(&writer)?;

        let mut readers = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let reader = Connection::open_with_flags(
                path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            pragmas::configure_readonly_connection(&reader)?;
            readers.push(Mutex::new(reader));
        }

        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            read_index: AtomicUsize::new(0),
        })
    }

    /// Open a single in-memory writer connection. Readers fall back to the
    /// writer since separate `open_in_memory` handles do not share state.
    pub fn open_in_memory() -> MemoryResult<Self> {
        let writer = Connection::open_in_memory()?;
        pragmas::configure_connection(&writer)?;

        Ok(Self {
            writer: Mutex::new(writer),
            readers: Vec::new(),
            read_index: AtomicUsize::new(0),
        })
    }

    pub fn with_writer<F, T>(&self, f: F) -> MemoryResult<T>
    where
        F: FnOnce(&Connection) -> MemoryResult<T>,
    {
        let conn = self
            .writer
            .lock()
            .map_err(|e| MemoryError::StorageIo(rusqlite::Error::InvalidParameterName(format!(
                "writer lock poisoned: {e}"
            ))))?;
        f(&conn)
    }

    /// Round-robin over the reader pool; falls back to the writer when the
    /// pool is empty (in-memory mode).
    pub fn with_reader<F, T>(&self, f: F) -> MemoryResult<T>
    where
        F: FnOnce(&Connection) -> MemoryResult<T>,
    {
        if self.readers.is_empty() {
            return self.with_writer(f);
        }
        let index = self.read_index.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[index]
            .lock()
            .map_err(|e| MemoryError::StorageIo(rusqlite::Error::InvalidParameterName(format!(
                "reader lock poisoned: {e}"
            ))))?;
        f(&conn)
    }

    pub fn is_wal_mode(&self) -> bool {
        self.with_writer(|conn| {
            let mode: String = conn
                .query_row("PRAGMA journal_mode", [], |row| row.get(0))
                .unwrap_or_default();
            Ok(mode.eq_ignore_ascii_case("wal"))
        })
        .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_reader_falls_back_to_writer() {
        let pool = ConnectionPool::open_in_memory().unwrap();
        pool.with_writer(|c| {
            c.execute_batch("CREATE TABLE t (id INTEGER);").unwrap();
            Ok(())
        })
        .unwrap();
        let count: i64 = pool
            .with_reader(|c| Ok(c.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn file_backed_pool_readers_round_robin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.db");
        let pool = ConnectionPool::open(&path, 2).unwrap();
        assert!(pool.is_wal_mode());
        for i in 0..4 {
            let seen_writer = pool.with_reader(|_| Ok(())).is_ok();
            assert!(seen_writer, "reader {i} should succeed");
        }
    }
}
