//! v003: vector-index bookkeeping table.
//!
//! The shadow `*_vec` virtual tables themselves are created lazily by
//! [`crate::shadow::sync_shadow_row`] once the embedding engine's dimension
//! is known — `vec0` tables are fixed-width per dimension, and the
//! configured engine (hence its dimension) can change across the store's
//! lifetime. This migration only creates the table that tracks which
//! dimension each shadow index currently targets.

use rusqlite::Connection;

use memory_core::MemoryResult;

pub fn migrate(conn: &Connection) -> MemoryResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS vector_index_state (
            table_name TEXT PRIMARY KEY,
            dim INTEGER NOT NULL
        );
        ",
    )?;
    Ok(())
}
