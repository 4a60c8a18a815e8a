//! v001: base tables for every tier except embeddings (added in v002+).

use rusqlite::Connection;

use memory_core::MemoryResult;

pub fn migrate(conn: &Connection) -> MemoryResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS vector_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );
        CREATE INDEX IF NOT EXISTS idx_vector_entries_created_at ON vector_entries(created_at);

        CREATE TABLE IF NOT EXISTS knowledge_links (
            entity_a TEXT NOT NULL,
            relation TEXT NOT NULL,
            entity_b TEXT NOT NULL,
            weight REAL NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            PRIMARY KEY (entity_a, relation, entity_b)
        );
        CREATE INDEX IF NOT EXISTS idx_knowledge_links_b ON knowledge_links(entity_b);

        CREATE TABLE IF NOT EXISTS cold_storage (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            predicate TEXT NOT NULL,
            args TEXT NOT NULL,
            fact_type TEXT NOT NULL,
            priority INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            last_accessed TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            access_count INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_cold_storage_predicate ON cold_storage(predicate);
        CREATE INDEX IF NOT EXISTS idx_cold_storage_last_accessed ON cold_storage(last_accessed);

        CREATE TABLE IF NOT EXISTS archived_facts (
            predicate TEXT NOT NULL,
            args TEXT NOT NULL,
            fact_type TEXT NOT NULL,
            archived_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );
        CREATE INDEX IF NOT EXISTS idx_archived_facts_archived_at ON archived_facts(archived_at);

        CREATE TABLE IF NOT EXISTS session_turns (
            session_id TEXT NOT NULL,
            turn_number INTEGER NOT NULL,
            user_input TEXT NOT NULL,
            intent_json TEXT NOT NULL DEFAULT 'null',
            response TEXT NOT NULL,
            atoms_json TEXT NOT NULL DEFAULT 'null',
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            PRIMARY KEY (session_id, turn_number)
        );

        CREATE TABLE IF NOT EXISTS activation_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fact_id INTEGER NOT NULL,
            score REAL NOT NULL,
            timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );
        CREATE INDEX IF NOT EXISTS idx_activation_log_timestamp ON activation_log(timestamp);
        CREATE INDEX IF NOT EXISTS idx_activation_log_fact_id ON activation_log(fact_id);

        CREATE TABLE IF NOT EXISTS compressed_states (
            session_id TEXT NOT NULL,
            turn_number INTEGER NOT NULL,
            state_json TEXT NOT NULL,
            compression_ratio REAL NOT NULL DEFAULT 1.0,
            PRIMARY KEY (session_id, turn_number)
        );

        CREATE TABLE IF NOT EXISTS reasoning_traces (
            id TEXT PRIMARY KEY,
            shard_id TEXT NOT NULL,
            shard_type TEXT NOT NULL,
            shard_category TEXT NOT NULL,
            session_id TEXT NOT NULL,
            task_context TEXT NOT NULL,
            system_prompt TEXT NOT NULL,
            user_prompt TEXT NOT NULL,
            response TEXT NOT NULL,
            success INTEGER NOT NULL,
            error_message TEXT,
            quality_score REAL NOT NULL DEFAULT 0.0,
            learning_notes TEXT NOT NULL DEFAULT '[]',
            duration_ms INTEGER NOT NULL DEFAULT 0,
            tokens_used INTEGER,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );
        CREATE INDEX IF NOT EXISTS idx_reasoning_traces_shard_type ON reasoning_traces(shard_type);
        CREATE INDEX IF NOT EXISTS idx_reasoning_traces_created_at ON reasoning_traces(created_at);
        ",
    )?;
    Ok(())
}
