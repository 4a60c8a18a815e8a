//! The learning store's own migration table — independent of, but run
//! through the same [`memory_storage::migrations::run_migrations`] engine
//! as, the main store's schema. Each shard-type database gets its own copy
//! of this schema (see [`crate::shard::LearningStore`]).

mod v001_initial_schema;

use memory_storage::migrations::MigrationFn;

pub const LATEST_VERSION: u32 = 1;

pub const MIGRATIONS: [(u32, &str, MigrationFn); 1] = [(1, "initial_schema", v001_initial_schema::migrate)];
