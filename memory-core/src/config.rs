//! Subsystem configuration, deserializable from TOML the way the rest of
//! the workspace's ambient configuration is: `#[serde(default)]` everywhere
//! so a caller can override only the fields it cares about.

use serde::{Deserialize, Serialize};

/// How the engine adapter opens and pools its database connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file, or `None` for an in-memory store.
    pub db_path: Option<String>,
    /// Number of read-only connections in the round-robin pool.
    pub read_pool_size: usize,
    /// Whether to load the optional vector-search extension at open.
    pub vector_extension_enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            read_pool_size: 2,
            vector_extension_enabled: true,
        }
    }
}

/// Tunables for the periodic cold-tier sweep (`maintenance_cleanup`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub archive_older_than_days: i64,
    pub max_access_count: i64,
    pub purge_archived_older_than_days: i64,
    pub clean_activation_log_days: i64,
    pub vacuum_database: bool,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            archive_older_than_days: 90,
            max_access_count: 5,
            purge_archived_older_than_days: 365,
            clean_activation_log_days: 1,
            vacuum_database: false,
        }
    }
}

/// Tunables for the background re-embedding workers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectionConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    pub batch_size: usize,
    /// Backlog size above which a cycle shrinks its batch and skips
    /// re-scanning already-healthy rows.
    pub backlog_watermark: usize,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 45,
            batch_size: 32,
            backlog_watermark: 500,
        }
    }
}

/// Aggregate configuration, loadable from a single TOML document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub storage: StorageConfig,
    pub maintenance: MaintenanceConfig,
    pub reflection: ReflectionConfig,
}

impl MemoryConfig {
    /// Load config from a TOML string, falling back to defaults for any
    /// field the document omits.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = MaintenanceConfig::default();
        assert_eq!(cfg.archive_older_than_days, 90);
        assert_eq!(cfg.max_access_count, 5);
        assert_eq!(cfg.purge_archived_older_than_days, 365);

        let r = ReflectionConfig::default();
        assert_eq!(r.interval_seconds, 45);
        assert_eq!(r.batch_size, 32);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg = MemoryConfig::from_toml("[reflection]\nbatch_size = 64\n").unwrap();
        assert_eq!(cfg.reflection.batch_size, 64);
        assert_eq!(cfg.reflection.interval_seconds, 45);
        assert!(cfg.storage.vector_extension_enabled);
    }
}
