//! The engine adapter: owns the connection pool, the process-local
//! read-write lock gate, and the open/migrate sequence.

use std::path::Path;
use std::sync::RwLock;

use memory_core::{MemoryResult, StorageConfig};

use crate::migrations::{self, MigrationFn};
use crate::pool::ConnectionPool;

/// A held read or write guard on the store's lock discipline. Dropped when
/// the caller is done; exists so internal `*_locked` helpers can be handed
/// proof that the gate is already held instead of re-acquiring it.
pub struct ReadGuard<'a>(std::sync::RwLockReadGuard<'a, ()>);
pub struct WriteGuard<'a>(std::sync::RwLockWriteGuard<'a, ()>);

/// Owns one database (file-backed or in-memory), its connection pool, and
/// the shared `RwLock` that gives the store's concurrency model — writers
/// exclusive, readers shared — a literal enforcement point on top of the
/// pool's physical connections.
pub struct StorageEngine {
    pool: ConnectionPool,
    gate: RwLock<()>,
    vector_extension_loaded: bool,
}

impl StorageEngine {
    /// Open (creating if absent) the database at `config.db_path`, or an
    /// in-memory database if unset, running the main store's migration
    /// table and registering the optional vector extension.
    pub fn open(config: &StorageConfig) -> MemoryResult<Self> {
        Self::open_with_schema(config, &migrations::MIGRATIONS, migrations::LATEST_VERSION)
    }

    /// Same as [`Self::open`] but against a caller-supplied migration table
    /// instead of the main store's — used by the learning store to open
    /// one independent database per shard type with its own schema.
    pub fn open_with_schema(
        config: &StorageConfig,
        migrations: &[(u32, &str, MigrationFn)],
        latest_version: u32,
    ) -> MemoryResult<Self> {
        if config.vector_extension_enabled {
            register_vector_extension();
        }

        let pool = match &config.db_path {
            Some(path) => ConnectionPool::open(Path::new(path), config.read_pool_size)?,
            None => ConnectionPool::open_in_memory()?,
        };

        // The auto-extension callback only affects connections opened after
        // registration, so this check against the already-open writer also
        // confirms registration actually took effect on this build.
        let vector_extension_loaded = config.vector_extension_enabled
            && pool.with_writer(|conn| Ok(vector_extension_present(conn)))?;

        pool.with_writer(|conn| {
            crate::migrations::run_migrations(conn, migrations, latest_version)?;
            Ok(())
        })?;

        Ok(Self {
            pool,
            gate: RwLock::new(()),
            vector_extension_loaded,
        })
    }

    pub fn open_in_memory() -> MemoryResult<Self> {
        Self::open(&StorageConfig {
            db_path: None,
            ..StorageConfig::default()
        })
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn vector_extension_available(&self) -> bool {
        self.vector_extension_loaded
    }

    /// Acquire the shared (read) side of the lock discipline. Hold this for
    /// the duration of a read; pass it (or just its existence) to
    /// `*_locked` helpers rather than calling public locked wrappers from
    /// inside one — nested acquisition of this lock deadlocks a writer
    /// waiting behind the current holders.
    pub fn read(&self) -> ReadGuard<'_> {
        ReadGuard(self.gate.read().expect("storage gate poisoned"))
    }

    /// Acquire the exclusive (write) side of the lock discipline.
    pub fn write(&self) -> WriteGuard<'_> {
        WriteGuard(self.gate.write().expect("storage gate poisoned"))
    }
}

#[cfg(feature = "vector-extension")]
static VEC_EXTENSION_REGISTERED: std::sync::Once = std::sync::Once::new();

/// Register `sqlite-vec`'s `vec0` module as a process-wide auto-extension.
/// Must run before any connection this process wants it on is opened —
/// `sqlite3_auto_extension` only affects connections opened afterward.
fn register_vector_extension() {
    #[cfg(feature = "vector-extension")]
    {
        VEC_EXTENSION_REGISTERED.call_once(|| unsafe {
            rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
                sqlite_vec::sqlite3_vec_init as *const (),
            )));
        });
    }
}

/// Confirm the extension actually loaded on this connection.
fn vector_extension_present(conn: &rusqlite::Connection) -> bool {
    #[cfg(feature = "vector-extension")]
    {
        conn.query_row("SELECT vec_version()", [], |_| Ok(())).is_ok()
    }
    #[cfg(not(feature = "vector-extension"))]
    {
        let _ = conn;
        false
    }
}
