//! Lazily-opened, independent database per `shard_type`.
//!
//! Per the store's deadlock-avoidance discipline, shard databases are
//! independent connection pools with their own read-write gate — a
//! caller juggling two shards never holds two gates at once because
//! every learning-tier operation takes exactly one shard's
//! [`memory_storage::StorageEngine`] and returns before touching another.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use memory_core::{MemoryResult, StorageConfig};
use memory_storage::StorageEngine;
use tracing::info;

use crate::migrations;

/// Owns one [`StorageEngine`] per `shard_type`, opened on first access and
/// cached for the life of the store.
pub struct LearningStore {
    base_path: PathBuf,
    read_pool_size: usize,
    vector_extension_enabled: bool,
    shards: DashMap<String, Arc<StorageEngine>>,
}

impl LearningStore {
    /// `base_path` is the directory under which each shard's
    /// `<shard_type>_learnings.db` file lives; it is created if absent.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self::with_config(base_path, 2, true)
    }

    pub fn with_config(base_path: impl Into<PathBuf>, read_pool_size: usize, vector_extension_enabled: bool) -> Self {
        Self {
            base_path: base_path.into(),
            read_pool_size,
            vector_extension_enabled,
            shards: DashMap::new(),
        }
    }

    /// The shard's engine, opening and migrating its database on first
    /// call for this `shard_type`. Concurrent first-calls for the same
    /// `shard_type` are serialized by the map's own per-key lock (via
    /// `entry`), so the database is only ever opened once rather than
    /// racing two opens against the same file.
    pub fn shard(&self, shard_type: &str) -> MemoryResult<Arc<StorageEngine>> {
        match self.shards.entry(shard_type.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                std::fs::create_dir_all(&self.base_path).map_err(|e| {
                    memory_core::MemoryError::InvalidArgument(format!(
                        "failed to create learning store base dir: {e}"
                    ))
                })?;
                let db_path = self.base_path.join(format!("{shard_type}_learnings.db"));
                let config = StorageConfig {
                    db_path: Some(db_path.to_string_lossy().to_string()),
                    read_pool_size: self.read_pool_size,
                    vector_extension_enabled: self.vector_extension_enabled,
                };
                let engine = Arc::new(StorageEngine::open_with_schema(
                    &config,
                    &migrations::MIGRATIONS,
                    migrations::LATEST_VERSION,
                )?);
                info!(shard_type, path = %db_path.display(), "opened learning shard database");
                entry.insert(Arc::clone(&engine));
                Ok(engine)
            }
        }
    }

    /// Shard types opened so far (insertion order is not preserved).
    pub fn open_shard_types(&self) -> Vec<String> {
        self.shards.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_one_database_per_shard_type_and_reuses_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = LearningStore::new(dir.path());

        let coder_a = store.shard("coder").unwrap();
        let coder_b = store.shard("coder").unwrap();
        assert!(Arc::ptr_eq(&coder_a, &coder_b));

        let planner = store.shard("planner").unwrap();
        assert!(!Arc::ptr_eq(&coder_a, &planner));

        assert!(dir.path().join("coder_learnings.db").exists());
        assert!(dir.path().join("planner_learnings.db").exists());
    }
}
