//! Shared helper for the `*_vec` shadow virtual tables that mirror a
//! primary row's embedding for fast nearest-neighbor search.
//!
//! Every tier that carries an embedding column (vector entries, reasoning
//! traces, learnings) goes through here instead of hand-rolling its own
//! `CREATE VIRTUAL TABLE` / `DELETE` / `INSERT` dance, so the "create once
//! the dimension is known, resize on change, never trust a stale shadow
//! row" discipline in the data-model invariants lives in one place.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use memory_core::MemoryResult;

use crate::codec;

/// Recreate the shadow vector-index row for `id` in `table`. If the shadow
/// table's configured dimension doesn't match `embedding`'s, the table is
/// dropped and recreated at the new width first — `vec0` tables are fixed
/// width per column. A no-op beyond bookkeeping when the vector extension
/// isn't loaded: the virtual-table creation fails and callers fall back to
/// brute-force cosine over the primary table.
pub fn sync_shadow_row(conn: &Connection, table: &str, id: i64, embedding: &[f32]) -> MemoryResult<()> {
    let dim = embedding.len() as i64;
    if dim == 0 {
        return clear_shadow_row(conn, table, id);
    }

    let current_dim: Option<i64> = conn
        .query_row(
            "SELECT dim FROM vector_index_state WHERE table_name = ?1",
            params![table],
            |row| row.get(0),
        )
        .optional()?;

    if current_dim != Some(dim) {
        let _ = conn.execute_batch(&format!("DROP TABLE IF EXISTS {table}"));
        let create = conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS {table} USING vec0(embedding float[{dim}])"
        ));
        if let Err(e) = create {
            warn!(table, error = %e, "shadow vector index unavailable, recall for this table falls back to brute force");
            return Ok(());
        }
        conn.execute(
            "INSERT INTO vector_index_state (table_name, dim) VALUES (?1, ?2)
             ON CONFLICT(table_name) DO UPDATE SET dim = excluded.dim",
            params![table, dim],
        )?;
    }

    let _ = conn.execute(&format!("DELETE FROM {table} WHERE rowid = ?1"), params![id]);
    let blob = codec::encode(embedding);
    let _ = conn.execute(
        &format!("INSERT INTO {table} (rowid, embedding) VALUES (?1, ?2)"),
        params![id, blob],
    );
    Ok(())
}

/// Drop a shadow row outright — used when a primary row's embedding is
/// cleared or its owning record is deleted. A no-op if the shadow table
/// doesn't exist.
pub fn clear_shadow_row(conn: &Connection, table: &str, id: i64) -> MemoryResult<()> {
    let _ = conn.execute(&format!("DELETE FROM {table} WHERE rowid = ?1"), params![id]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StorageEngine;

    #[test]
    fn sync_without_extension_is_a_harmless_noop() {
        let engine = StorageEngine::open_in_memory().unwrap();
        engine
            .pool()
            .with_writer(|conn| sync_shadow_row(conn, "vector_entries_vec", 1, &[1.0, 2.0, 3.0]))
            .unwrap();
    }
}
