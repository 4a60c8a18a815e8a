//! SQLite persistence layer for the memory-tier store.
//!
//! Single write connection + round-robin read pool (WAL mode), a
//! process-local read-write lock gating access to that pool, versioned
//! migrations, and one query module per tier.

pub mod codec;
pub mod engine;
pub mod maintenance;
pub mod migrations;
pub mod pool;
pub mod pragmas;
pub mod queries;
pub mod shadow;

pub use engine::StorageEngine;
