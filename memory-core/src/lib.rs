//! Shared vocabulary for the embedded memory-tier store.
//!
//! Holds the error taxonomy, subsystem configuration, the wire types that
//! cross tier boundaries, and the trait two external collaborators
//! (an embedding engine, a rule-engine assertion sink) must implement.

pub mod config;
pub mod errors;
pub mod traits;
pub mod types;

pub use config::{MaintenanceConfig, ReflectionConfig, StorageConfig};
pub use errors::{MemoryError, MemoryResult};
pub use traits::{AssertFn, EmbeddingEngine, EmbeddingTask};
pub use types::*;
