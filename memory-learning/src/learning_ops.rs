//! Per-shard learning CRUD, confidence decay, and the backlog scans the
//! learning-tier reflection loop polls.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use tracing::warn;

use memory_core::{Learning, MemoryResult};
use memory_storage::StorageEngine;

pub fn save(engine: &StorageEngine, learning: &Learning) -> MemoryResult<i64> {
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        conn.execute(
            "INSERT INTO learnings (shard_type, fact_predicate, fact_args, confidence, campaign)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                learning.shard_type,
                learning.fact_predicate,
                serde_json::to_string(&learning.fact_args)?,
                learning.confidence.clamp(0.0, 1.0),
                learning.campaign,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// All learnings for `predicate`, most recently learned first.
pub fn load(engine: &StorageEngine, predicate: &str) -> MemoryResult<Vec<Learning>> {
    query_learnings(
        engine,
        "SELECT * FROM learnings WHERE fact_predicate = ?1 ORDER BY learned_at DESC",
        params![predicate],
    )
}

/// Learnings for `predicate` with `confidence >= min_confidence`, highest
/// confidence first.
pub fn load_by_predicate(engine: &StorageEngine, predicate: &str, min_confidence: f64) -> MemoryResult<Vec<Learning>> {
    query_learnings(
        engine,
        "SELECT * FROM learnings WHERE fact_predicate = ?1 AND confidence >= ?2 ORDER BY confidence DESC",
        params![predicate, min_confidence],
    )
}

fn query_learnings(engine: &StorageEngine, sql: &str, args: impl rusqlite::Params) -> MemoryResult<Vec<Learning>> {
    let _guard = engine.read();
    engine.pool().with_reader(|conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, row_to_learning)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    })
}

/// Multiply every row's confidence by `factor` and clamp the result to
/// `floor`, never letting decay push a learning below the caller's
/// configured minimum. Returns the number of rows touched.
pub fn decay_confidence(engine: &StorageEngine, factor: f64, floor: f64) -> MemoryResult<i64> {
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        let n = conn.execute(
            "UPDATE learnings SET confidence = MAX(?2, MIN(1.0, confidence * ?1))",
            params![factor, floor],
        )?;
        Ok(n as i64)
    })
}

/// Rows whose semantic handle is missing or older than `current_version`.
pub fn learnings_needing_handle(engine: &StorageEngine, current_version: i64, limit: usize) -> MemoryResult<Vec<Learning>> {
    query_learnings(
        engine,
        "SELECT * FROM learnings WHERE semantic_handle IS NULL OR handle_version < ?1 ORDER BY learned_at ASC LIMIT ?2",
        params![current_version, limit as i64],
    )
}

/// Rows with a current handle but an embedding that doesn't match the
/// given `(model_id, dim, task)` triple.
pub fn learnings_needing_embedding(
    engine: &StorageEngine,
    model_id: &str,
    dim: i64,
    task: &str,
    limit: usize,
) -> MemoryResult<Vec<Learning>> {
    query_learnings(
        engine,
        "SELECT * FROM learnings
         WHERE semantic_handle IS NOT NULL
           AND (embedding IS NULL OR embedding_model_id != ?1 OR embedding_dim != ?2 OR embedding_task != ?3)
         ORDER BY learned_at ASC LIMIT ?4",
        params![model_id, dim, task, limit as i64],
    )
}

pub fn apply_handle(engine: &StorageEngine, id: &str, handle: &str, hash: &str, version: i64) -> MemoryResult<()> {
    let row_id: i64 = id
        .parse()
        .map_err(|_| memory_core::MemoryError::InvalidArgument(format!("learning id is not numeric: {id}")))?;
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        conn.execute(
            "UPDATE learnings SET semantic_handle = ?1, handle_hash = ?2, handle_version = ?3 WHERE id = ?4",
            params![handle, hash, version, row_id],
        )?;
        Ok(())
    })
}

pub fn apply_embedding(engine: &StorageEngine, id: &str, embedding: &[f32], model_id: &str, task: &str) -> MemoryResult<()> {
    let row_id: i64 = id
        .parse()
        .map_err(|_| memory_core::MemoryError::InvalidArgument(format!("learning id is not numeric: {id}")))?;
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        let blob = memory_storage::codec::encode(embedding);
        conn.execute(
            "UPDATE learnings SET embedding = ?1, embedding_model_id = ?2, embedding_dim = ?3, embedding_task = ?4 WHERE id = ?5",
            params![blob, model_id, embedding.len() as i64, task, row_id],
        )?;
        memory_storage::shadow::sync_shadow_row(conn, "learnings_vec", row_id, embedding)?;
        Ok(())
    })
}

fn row_to_learning(row: &Row<'_>) -> rusqlite::Result<Learning> {
    let id: i64 = row.get("id")?;
    let fact_args_json: String = row.get("fact_args")?;
    let fact_args = serde_json::from_str(&fact_args_json).unwrap_or_else(|e| {
        warn!(id, error = %e, "malformed learnings fact_args, treating row as having none");
        Vec::new()
    });
    let learned_at: String = row.get("learned_at")?;
    Ok(Learning {
        id,
        shard_type: row.get("shard_type")?,
        fact_predicate: row.get("fact_predicate")?,
        fact_args,
        confidence: row.get("confidence")?,
        learned_at: parse_dt(&learned_at),
        campaign: row.get("campaign")?,
        semantic_handle: row.get("semantic_handle")?,
        handle_version: row.get("handle_version")?,
        handle_hash: row.get("handle_hash")?,
        embedding: row.get("embedding")?,
        embedding_model_id: row.get("embedding_model_id")?,
        embedding_dim: row.get("embedding_dim")?,
        embedding_task: row.get("embedding_task")?,
    })
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn learning(predicate: &str, confidence: f64) -> Learning {
        Learning {
            id: 0,
            shard_type: "coder".into(),
            fact_predicate: predicate.into(),
            fact_args: vec![json!("early_return")],
            confidence,
            learned_at: Utc::now(),
            campaign: None,
            semantic_handle: None,
            handle_version: 0,
            handle_hash: None,
            embedding: None,
            embedding_model_id: None,
            embedding_dim: None,
            embedding_task: None,
        }
    }

    #[test]
    fn save_load_and_filter_by_confidence() {
        let engine = StorageEngine::open_in_memory().unwrap();
        save(&engine, &learning("prefers_pattern", 0.9)).unwrap();
        save(&engine, &learning("prefers_pattern", 0.2)).unwrap();

        assert_eq!(load(&engine, "prefers_pattern").unwrap().len(), 2);
        assert_eq!(load_by_predicate(&engine, "prefers_pattern", 0.5).unwrap().len(), 1);
    }

    #[test]
    fn decay_shrinks_confidence_but_respects_floor() {
        let engine = StorageEngine::open_in_memory().unwrap();
        save(&engine, &learning("p", 0.8)).unwrap();
        save(&engine, &learning("p", 0.05)).unwrap();

        let touched = decay_confidence(&engine, 0.5, 0.1).unwrap();
        assert_eq!(touched, 2);

        let rows = load(&engine, "p").unwrap();
        assert!(rows.iter().any(|r| (r.confidence - 0.4).abs() < 1e-9));
        assert!(rows.iter().all(|r| r.confidence >= 0.1));
    }

    #[test]
    fn handle_and_embedding_backlog_round_trip() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let id = save(&engine, &learning("p", 0.9)).unwrap();

        let stale = learnings_needing_handle(&engine, 1, 10).unwrap();
        assert_eq!(stale.len(), 1);
        apply_handle(&engine, &id.to_string(), "coder: p(early_return)", "hash", 1).unwrap();
        assert!(learnings_needing_handle(&engine, 1, 10).unwrap().is_empty());

        let stale = learnings_needing_embedding(&engine, "m", 4, "knowledge_atom", 10).unwrap();
        assert_eq!(stale.len(), 1);
        apply_embedding(&engine, &id.to_string(), &[0.1, 0.2, 0.3, 0.4], "m", "knowledge_atom").unwrap();
        assert!(learnings_needing_embedding(&engine, "m", 4, "knowledge_atom", 10).unwrap().is_empty());
    }
}
