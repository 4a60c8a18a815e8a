//! v001: the `learnings` table plus the same vector-index bookkeeping
//! table the main store uses for its `*_vec` shadow tables — `shadow.rs`'s
//! `sync_shadow_row` looks it up by table name regardless of which
//! database it's running against.

use rusqlite::Connection;

use memory_core::MemoryResult;

pub fn migrate(conn: &Connection) -> MemoryResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS learnings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            shard_type TEXT NOT NULL,
            fact_predicate TEXT NOT NULL,
            fact_args TEXT NOT NULL DEFAULT '[]',
            confidence REAL NOT NULL DEFAULT 0.5,
            learned_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            campaign TEXT,
            semantic_handle TEXT,
            handle_version INTEGER NOT NULL DEFAULT 0,
            handle_hash TEXT,
            embedding BLOB,
            embedding_model_id TEXT,
            embedding_dim INTEGER,
            embedding_task TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_learnings_predicate ON learnings(fact_predicate);
        CREATE INDEX IF NOT EXISTS idx_learnings_shard_type ON learnings(shard_type);

        CREATE TABLE IF NOT EXISTS vector_index_state (
            table_name TEXT PRIMARY KEY,
            dim INTEGER NOT NULL
        );
        ",
    )?;
    Ok(())
}
