//! v002: embedding columns on the two rows that can carry one.

use rusqlite::Connection;

use memory_core::MemoryResult;

pub fn migrate(conn: &Connection) -> MemoryResult<()> {
    conn.execute_batch(
        "
        ALTER TABLE vector_entries ADD COLUMN embedding BLOB;
        ALTER TABLE vector_entries ADD COLUMN embedding_model_id TEXT;
        ALTER TABLE vector_entries ADD COLUMN embedding_dim INTEGER;
        ALTER TABLE vector_entries ADD COLUMN embedding_task TEXT;

        ALTER TABLE reasoning_traces ADD COLUMN embedding BLOB;
        ALTER TABLE reasoning_traces ADD COLUMN embedding_model_id TEXT;
        ALTER TABLE reasoning_traces ADD COLUMN embedding_dim INTEGER;
        ALTER TABLE reasoning_traces ADD COLUMN embedding_task TEXT;
        ",
    )?;
    Ok(())
}
