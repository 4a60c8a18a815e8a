//! Per-agent-kind learning stores: one SQLite database per `shard_type`,
//! confidence-scored and decayed over time, reflected into semantic
//! handles and embeddings by the same cycle machinery `memory-embeddings`
//! runs for reasoning traces.

pub mod learning_ops;
pub mod learning_target;
pub mod migrations;
pub mod shard;

pub use learning_target::LearningReflection;
pub use shard::LearningStore;
