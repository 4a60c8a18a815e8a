//! Vector tier: content + optional embedding, lexical and (brute-force or
//! index-backed) semantic recall.
//!
//! This module never calls the embedding engine itself — that's an async
//! collaborator, and this crate's API is synchronous all the way down. The
//! embedding-aware entry points accept an already-computed vector; the
//! crate that owns the engine (`memory-embeddings`) awaits it and then
//! calls through to `store_vector_with_embedding`.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use memory_core::{MemoryResult, VectorEntry};

use crate::codec;
use crate::engine::StorageEngine;

const SHADOW_TABLE: &str = "vector_entries_vec";

/// Insert content with no embedding. Dedups by content hash: re-storing the
/// same content updates metadata on the existing row instead of inserting
/// a duplicate.
pub fn store_vector(
    engine: &StorageEngine,
    content: &str,
    metadata: &HashMap<String, Value>,
) -> MemoryResult<i64> {
    let _guard = engine.write();
    engine
        .pool()
        .with_writer(|conn| store_vector_locked(conn, content, metadata))
}

fn store_vector_locked(
    conn: &Connection,
    content: &str,
    metadata: &HashMap<String, Value>,
) -> MemoryResult<i64> {
    let hash = codec::content_hash(content);
    let metadata_json = serde_json::to_string(metadata)?;

    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM vector_entries WHERE content_hash = ?1",
            params![hash],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        conn.execute(
            "UPDATE vector_entries SET metadata = ?1 WHERE id = ?2",
            params![metadata_json, id],
        )?;
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO vector_entries (content, metadata, content_hash) VALUES (?1, ?2, ?3)",
        params![content, metadata_json, hash],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert content together with a precomputed embedding, keeping the
/// `*_vec` shadow index in sync when the vector extension is loaded.
pub fn store_vector_with_embedding(
    engine: &StorageEngine,
    content: &str,
    metadata: &HashMap<String, Value>,
    embedding: &[f32],
    model_id: &str,
    task: &str,
) -> MemoryResult<i64> {
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        let id = store_vector_locked(conn, content, metadata)?;
        apply_embedding(conn, id, embedding, model_id, task)?;
        Ok(id)
    })
}

fn apply_embedding(
    conn: &Connection,
    id: i64,
    embedding: &[f32],
    model_id: &str,
    task: &str,
) -> MemoryResult<()> {
    let blob = codec::encode(embedding);
    conn.execute(
        "UPDATE vector_entries SET embedding = ?1, embedding_model_id = ?2, embedding_dim = ?3, embedding_task = ?4
         WHERE id = ?5",
        params![blob, model_id, embedding.len() as i64, task, id],
    )?;
    crate::shadow::sync_shadow_row(conn, SHADOW_TABLE, id, embedding)?;
    Ok(())
}

/// Public entry point for reflection-style callers that already hold a
/// computed embedding for an existing row (as opposed to `store_vector_*`,
/// which also creates the row).
pub fn apply_vector_embedding(
    engine: &StorageEngine,
    id: i64,
    embedding: &[f32],
    model_id: &str,
    task: &str,
) -> MemoryResult<()> {
    let _guard = engine.write();
    engine
        .pool()
        .with_writer(|conn| apply_embedding(conn, id, embedding, model_id, task))
}

/// Vector entries with no embedding, or one stamped with a stale
/// `(model_id, dim, task)` triple — the backlog a forced bulk re-embed (or
/// a future reflection pass over the vector tier) needs to drain.
pub fn vectors_needing_embedding(
    engine: &StorageEngine,
    model_id: &str,
    dim: i64,
    task: &str,
    limit: usize,
) -> MemoryResult<Vec<VectorEntry>> {
    let _guard = engine.read();
    engine.pool().with_reader(|conn| {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM vector_entries
             WHERE embedding IS NULL
                OR embedding_model_id != ?1 OR embedding_dim != ?2 OR embedding_task != ?3
             ORDER BY created_at ASC LIMIT ?4"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![model_id, dim, task, limit as i64], row_to_vector_entry)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    })
}

fn row_to_vector_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<VectorEntry> {
    let id: i64 = row.get(0)?;
    let metadata_json: String = row.get(1)?;
    let metadata: HashMap<String, Value> = serde_json::from_str(&metadata_json).unwrap_or_else(|e| {
        warn!(id, error = %e, "malformed vector_entries metadata, treating row as having no metadata");
        HashMap::new()
    });
    let created_at_str: String = row.get(2)?;
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now());
    Ok(VectorEntry {
        id,
        content: row.get(3)?,
        metadata,
        created_at,
        embedding: row.get(4)?,
        embedding_model_id: row.get(5)?,
        embedding_dim: row.get(6)?,
        embedding_task: row.get(7)?,
        content_hash: row.get(8)?,
    })
}

const SELECT_COLUMNS: &str = "id, metadata, created_at, content, embedding, embedding_model_id, embedding_dim, embedding_task, content_hash";

/// Tokenizes a lexical-fallback query: case-fold, split on whitespace,
/// discard tokens shorter than 4 characters. A query with no surviving
/// tokens (all words too short) matches nothing.
fn tokenize_query(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|tok| tok.chars().count() >= 4)
        .map(|tok| tok.to_string())
        .collect()
}

/// Lexical fallback: case-folded, whitespace-tokenized substring match
/// against content (all tokens must appear), most recent first. Empty
/// query, or a query whose tokens all fall below the length floor, returns
/// no rows.
pub fn vector_recall(engine: &StorageEngine, query: &str, limit: usize) -> MemoryResult<Vec<VectorEntry>> {
    let tokens = tokenize_query(query);
    if tokens.is_empty() {
        return Ok(Vec::new());
    }
    let _guard = engine.read();
    engine.pool().with_reader(|conn| {
        let conditions: Vec<String> = (0..tokens.len()).map(|i| format!("LOWER(content) LIKE ?{}", i + 1)).collect();
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM vector_entries
             WHERE {}
             ORDER BY created_at DESC LIMIT ?{}",
            conditions.join(" AND "),
            tokens.len() + 1
        );
        let mut stmt = conn.prepare(&sql)?;
        let patterns: Vec<String> = tokens.iter().map(|tok| format!("%{tok}%")).collect();
        let mut query_params: Vec<&dyn rusqlite::ToSql> = patterns.iter().map(|p| p as &dyn rusqlite::ToSql).collect();
        let limit_i64 = limit as i64;
        query_params.push(&limit_i64);
        let rows = stmt.query_map(query_params.as_slice(), row_to_vector_entry)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    })
}

/// Rowids the shadow `vec0` table judges nearest to `query_embedding`, most
/// similar first, or `None` if the index can't answer this query (no
/// extension loaded, no shadow table yet, or a width mismatch against the
/// table's configured dimension). `fetch` is an over-fetch multiplier on
/// top of `limit` to absorb the exact-cosine re-ranking and the negative-
/// similarity filter done afterward in the primary table.
fn indexed_candidate_ids(conn: &Connection, query_embedding: &[f32], fetch: usize) -> Option<Vec<i64>> {
    let query_blob = codec::encode(query_embedding);
    let sql = format!("SELECT rowid FROM {SHADOW_TABLE} WHERE embedding MATCH ?1 ORDER BY distance LIMIT ?2");
    let mut stmt = conn.prepare(&sql).ok()?;
    let rows = stmt
        .query_map(params![query_blob, fetch as i64], |row| row.get::<_, i64>(0))
        .ok()?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row.ok()?);
    }
    Some(ids)
}

/// Score a known set of candidate rowids by exact cosine similarity against
/// the primary table, rather than trusting the shadow index's distance
/// metric directly — the store's invariant is that recall ranks by cosine,
/// and a stale or narrower shadow row must never silently stand in for the
/// primary one.
fn score_candidates(conn: &Connection, ids: &[i64], query_embedding: &[f32]) -> MemoryResult<Vec<(VectorEntry, f64)>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders: Vec<String> = (0..ids.len()).map(|i| format!("?{}", i + 1)).collect();
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM vector_entries WHERE id IN ({}) AND embedding IS NOT NULL",
        placeholders.join(", ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let id_params: Vec<&dyn rusqlite::ToSql> = ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
    let rows = stmt.query_map(id_params.as_slice(), row_to_vector_entry)?;
    let mut scored = Vec::new();
    for row in rows {
        let entry = row?;
        let Some(blob) = &entry.embedding else { continue };
        let vec = codec::decode(blob);
        if vec.len() != query_embedding.len() {
            continue;
        }
        let sim = codec::cosine(&vec, query_embedding);
        if sim > 0.0 {
            scored.push((entry, sim));
        }
    }
    Ok(scored)
}

fn brute_force_semantic_scan(conn: &Connection, query_embedding: &[f32], limit: usize) -> MemoryResult<Vec<(VectorEntry, f64)>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM vector_entries WHERE embedding IS NOT NULL");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_vector_entry)?;
    let mut scored = Vec::new();
    for row in rows {
        let entry = row?;
        let Some(blob) = &entry.embedding else { continue };
        let vec = codec::decode(blob);
        if vec.len() != query_embedding.len() {
            continue;
        }
        let sim = codec::cosine(&vec, query_embedding);
        if sim > 0.0 {
            scored.push((entry, sim));
        }
    }
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    Ok(scored)
}

/// Top-K semantic recall by cosine similarity. Uses the shadow `vec0` index
/// when the vector extension is loaded, re-ranking the candidates it
/// returns by exact cosine against the primary table; falls back to a
/// brute-force scan of the primary table when the extension isn't loaded,
/// or when the indexed query can't be answered (missing shadow table,
/// dimension mismatch) or comes back empty. Rows whose stored dimension
/// doesn't match `query_embedding` are skipped. Negative-similarity rows
/// are filtered out.
pub fn vector_recall_semantic(
    engine: &StorageEngine,
    query_embedding: &[f32],
    limit: usize,
) -> MemoryResult<Vec<(VectorEntry, f64)>> {
    if query_embedding.is_empty() {
        return Ok(Vec::new());
    }
    let _guard = engine.read();
    let use_index = engine.vector_extension_available();
    engine.pool().with_reader(|conn| {
        if use_index {
            if let Some(ids) = indexed_candidate_ids(conn, query_embedding, limit.saturating_mul(4).max(limit)) {
                if !ids.is_empty() {
                    let mut scored = score_candidates(conn, &ids, query_embedding)?;
                    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                    scored.truncate(limit);
                    return Ok(scored);
                }
            } else {
                warn!("vector index query unavailable, falling back to brute-force cosine scan");
            }
        }
        brute_force_semantic_scan(conn, query_embedding, limit)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> HashMap<String, Value> {
        HashMap::new()
    }

    #[test]
    fn dedups_by_content_hash() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let id1 = store_vector(&engine, "hello world", &meta()).unwrap();
        let id2 = store_vector(&engine, "hello world", &meta()).unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn embedding_roundtrip_via_semantic_recall() {
        let engine = StorageEngine::open_in_memory().unwrap();
        store_vector_with_embedding(&engine, "alpha", &meta(), &[1.0, 0.0, 0.0], "m1", "query").unwrap();
        store_vector_with_embedding(&engine, "beta", &meta(), &[0.0, 1.0, 0.0], "m1", "query").unwrap();

        let results = vector_recall_semantic(&engine, &[1.0, 0.0, 0.0], 5).unwrap();
        assert_eq!(results[0].0.content, "alpha");
    }

    #[test]
    fn dimension_mismatch_is_skipped() {
        let engine = StorageEngine::open_in_memory().unwrap();
        store_vector_with_embedding(&engine, "alpha", &meta(), &[1.0, 0.0], "m1", "query").unwrap();
        let results = vector_recall_semantic(&engine, &[1.0, 0.0, 0.0], 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn empty_query_returns_empty() {
        let engine = StorageEngine::open_in_memory().unwrap();
        store_vector(&engine, "hello", &meta()).unwrap();
        assert!(vector_recall(&engine, "", 10).unwrap().is_empty());
        assert!(vector_recall_semantic(&engine, &[], 10).unwrap().is_empty());
    }

    #[test]
    fn lexical_recall_tokenizes_and_discards_short_words() {
        let engine = StorageEngine::open_in_memory().unwrap();
        store_vector(&engine, "the quick brown fox jumps", &meta()).unwrap();
        store_vector(&engine, "a lazy dog sleeps", &meta()).unwrap();

        let results = vector_recall(&engine, "quick fox", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "the quick brown fox jumps");

        // every token below the 4-char floor means nothing survives to match on
        assert!(vector_recall(&engine, "a to is", 10).unwrap().is_empty());
    }

    #[test]
    fn negative_similarity_filtered_out() {
        let engine = StorageEngine::open_in_memory().unwrap();
        store_vector_with_embedding(&engine, "opposite", &meta(), &[-1.0, 0.0, 0.0], "m1", "query").unwrap();
        let results = vector_recall_semantic(&engine, &[1.0, 0.0, 0.0], 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn semantic_recall_ranks_correctly_whether_or_not_the_index_is_loaded() {
        // Whether this build linked sqlite-vec, the candidate-then-rerank
        // path and the brute-force path must agree on ranking: both score
        // by exact cosine over the same rows.
        let engine = StorageEngine::open_in_memory().unwrap();
        for i in 0..20 {
            let mut v = vec![0.0_f32; 8];
            v[i % 8] = 1.0;
            store_vector_with_embedding(&engine, &format!("atom {i}"), &meta(), &v, "m1", "query").unwrap();
        }
        let mut query = vec![0.0_f32; 8];
        query[3] = 1.0;
        let results = vector_recall_semantic(&engine, &query, 3).unwrap();
        assert!(!results.is_empty());
        for (entry, sim) in &results {
            assert!(entry.content.ends_with('3') || entry.content.ends_with("11") || entry.content.ends_with("19"));
            assert!((*sim - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn indexed_candidates_fall_back_to_brute_force_when_index_returns_nothing() {
        let engine = StorageEngine::open_in_memory().unwrap();
        store_vector_with_embedding(&engine, "alpha", &meta(), &[1.0, 0.0, 0.0], "m1", "query").unwrap();
        // No shadow table exists yet for a 5-dim query, so an indexed lookup
        // at that width can't be answered; brute force still finds nothing
        // because of the dimension mismatch, not because the index failed.
        let results = vector_recall_semantic(&engine, &[1.0, 0.0, 0.0, 0.0, 0.0], 5).unwrap();
        assert!(results.is_empty());
    }
}
