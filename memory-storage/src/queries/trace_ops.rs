//! Reasoning-trace store: CRUD, quality-gated queries, and the backlog
//! scan reflection workers poll to find rows that need a fresh descriptor
//! or embedding.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use tracing::warn;

use memory_core::{MemoryResult, ReasoningTrace};

use crate::engine::StorageEngine;

pub fn store_trace(engine: &StorageEngine, trace: &ReasoningTrace) -> MemoryResult<()> {
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        conn.execute(
            "INSERT INTO reasoning_traces
                (id, shard_id, shard_type, shard_category, session_id, task_context,
                 system_prompt, user_prompt, response, success, error_message,
                 quality_score, learning_notes, duration_ms, tokens_used)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
            params![
                trace.id,
                trace.shard_id,
                trace.shard_type,
                trace.shard_category,
                trace.session_id,
                trace.task_context,
                trace.system_prompt,
                trace.user_prompt,
                trace.response,
                trace.success as i64,
                trace.error_message,
                trace.quality_score,
                serde_json::to_string(&trace.learning_notes)?,
                trace.duration_ms,
                trace.tokens_used,
            ],
        )?;
        Ok(())
    })
}

pub fn get_traces_by_shard_type(
    engine: &StorageEngine,
    shard_type: &str,
    limit: usize,
) -> MemoryResult<Vec<ReasoningTrace>> {
    query_traces(
        engine,
        "SELECT * FROM reasoning_traces WHERE shard_type = ?1 ORDER BY created_at DESC LIMIT ?2",
        params![shard_type, limit as i64],
    )
}

pub fn get_failed_traces(engine: &StorageEngine, limit: usize) -> MemoryResult<Vec<ReasoningTrace>> {
    query_traces(
        engine,
        "SELECT * FROM reasoning_traces WHERE success = 0 ORDER BY created_at DESC LIMIT ?1",
        params![limit as i64],
    )
}

pub fn get_traces_above_quality(
    engine: &StorageEngine,
    min_quality: f64,
    limit: usize,
) -> MemoryResult<Vec<ReasoningTrace>> {
    query_traces(
        engine,
        "SELECT * FROM reasoning_traces WHERE quality_score >= ?1 ORDER BY quality_score DESC LIMIT ?2",
        params![min_quality, limit as i64],
    )
}

/// Case-folded substring match on `task_context`.
pub fn get_traces_by_task_context(
    engine: &StorageEngine,
    needle: &str,
    limit: usize,
) -> MemoryResult<Vec<ReasoningTrace>> {
    let pattern = format!("%{}%", needle.to_lowercase());
    query_traces(
        engine,
        "SELECT * FROM reasoning_traces WHERE LOWER(task_context) LIKE ?1 ORDER BY created_at DESC LIMIT ?2",
        params![pattern, limit as i64],
    )
}

fn query_traces(
    engine: &StorageEngine,
    sql: &str,
    args: impl rusqlite::Params,
) -> MemoryResult<Vec<ReasoningTrace>> {
    let _guard = engine.read();
    engine.pool().with_reader(|conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, row_to_trace)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    })
}

pub fn update_trace_quality(
    engine: &StorageEngine,
    id: &str,
    quality_score: f64,
    learning_notes: &[String],
) -> MemoryResult<()> {
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        conn.execute(
            "UPDATE reasoning_traces SET quality_score = ?1, learning_notes = ?2 WHERE id = ?3",
            params![quality_score, serde_json::to_string(learning_notes)?, id],
        )?;
        Ok(())
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TraceStats {
    pub total: i64,
    pub successes: i64,
}

impl TraceStats {
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successes as f64 / self.total as f64
        }
    }
}

pub fn get_trace_stats(engine: &StorageEngine) -> MemoryResult<TraceStats> {
    let _guard = engine.read();
    engine.pool().with_reader(|conn| {
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM reasoning_traces", [], |r| r.get(0))?;
        let successes: i64 = conn.query_row(
            "SELECT COUNT(*) FROM reasoning_traces WHERE success = 1",
            [],
            |r| r.get(0),
        )?;
        Ok(TraceStats { total, successes })
    })
}

pub fn cleanup_old_traces(engine: &StorageEngine, older_than_days: i64) -> MemoryResult<i64> {
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        let n = conn.execute(
            "DELETE FROM reasoning_traces WHERE created_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1)",
            params![format!("-{older_than_days} days")],
        )?;
        Ok(n as i64)
    })
}

/// Rows whose descriptor is missing or stale (`descriptor_version` behind
/// `current_version`), up to `limit`. Read the latest `current_version`
/// `candidates` worth before acting — reflection compares embedding
/// metadata itself once it has the row in hand.
pub fn traces_needing_descriptor(
    engine: &StorageEngine,
    current_version: i64,
    limit: usize,
) -> MemoryResult<Vec<ReasoningTrace>> {
    query_traces(
        engine,
        "SELECT * FROM reasoning_traces
         WHERE summary_descriptor IS NULL OR descriptor_version < ?1
         ORDER BY created_at ASC LIMIT ?2",
        params![current_version, limit as i64],
    )
}

/// Rows with an up-to-date descriptor but an embedding that doesn't match
/// the given `(model_id, dim, task)` triple.
pub fn traces_needing_embedding(
    engine: &StorageEngine,
    model_id: &str,
    dim: i64,
    task: &str,
    limit: usize,
) -> MemoryResult<Vec<ReasoningTrace>> {
    query_traces(
        engine,
        "SELECT * FROM reasoning_traces
         WHERE summary_descriptor IS NOT NULL
           AND (embedding IS NULL OR embedding_model_id != ?1 OR embedding_dim != ?2 OR embedding_task != ?3)
         ORDER BY created_at ASC LIMIT ?4",
        params![model_id, dim, task, limit as i64],
    )
}

pub fn apply_descriptor(engine: &StorageEngine, id: &str, descriptor: &str, hash: &str, version: i64) -> MemoryResult<()> {
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        conn.execute(
            "UPDATE reasoning_traces SET summary_descriptor = ?1, descriptor_hash = ?2, descriptor_version = ?3 WHERE id = ?4",
            params![descriptor, hash, version, id],
        )?;
        Ok(())
    })
}

pub fn apply_embedding(
    engine: &StorageEngine,
    id: &str,
    embedding: &[f32],
    model_id: &str,
    task: &str,
) -> MemoryResult<()> {
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        let blob = crate::codec::encode(embedding);
        conn.execute(
            "UPDATE reasoning_traces SET embedding = ?1, embedding_model_id = ?2, embedding_dim = ?3, embedding_task = ?4 WHERE id = ?5",
            params![blob, model_id, embedding.len() as i64, task, id],
        )?;
        let rowid: i64 = conn.query_row(
            "SELECT rowid FROM reasoning_traces WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )?;
        crate::shadow::sync_shadow_row(conn, "reasoning_traces_vec", rowid, embedding)?;
        Ok(())
    })
}

fn row_to_trace(row: &Row<'_>) -> rusqlite::Result<ReasoningTrace> {
    let id: String = row.get("id")?;
    let learning_notes_json: String = row.get("learning_notes")?;
    let learning_notes: Vec<String> = serde_json::from_str(&learning_notes_json).unwrap_or_else(|e| {
        warn!(id, error = %e, "malformed reasoning_traces learning_notes, treating row as having none");
        Vec::new()
    });
    let created_at: String = row.get("created_at")?;
    Ok(ReasoningTrace {
        id,
        shard_id: row.get("shard_id")?,
        shard_type: row.get("shard_type")?,
        shard_category: row.get("shard_category")?,
        session_id: row.get("session_id")?,
        task_context: row.get("task_context")?,
        system_prompt: row.get("system_prompt")?,
        user_prompt: row.get("user_prompt")?,
        response: row.get("response")?,
        success: row.get::<_, i64>("success")? != 0,
        error_message: row.get("error_message")?,
        quality_score: row.get("quality_score")?,
        learning_notes,
        duration_ms: row.get("duration_ms")?,
        tokens_used: row.get("tokens_used")?,
        created_at: parse_dt(&created_at),
        summary_descriptor: row.get("summary_descriptor")?,
        descriptor_version: row.get("descriptor_version")?,
        descriptor_hash: row.get("descriptor_hash")?,
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
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn trace(id: String, success: bool, quality: f64) -> ReasoningTrace {
        ReasoningTrace {
            id,
            shard_id: "shard-1".into(),
            shard_type: "coder".into(),
            shard_category: "coder".into(),
            session_id: "s1".into(),
            task_context: "refactor module".into(),
            system_prompt: "".into(),
            user_prompt: "".into(),
            response: "".into(),
            success,
            error_message: None,
            quality_score: quality,
            learning_notes: vec![],
            duration_ms: 100,
            tokens_used: Some(10),
            created_at: Utc::now(),
            summary_descriptor: None,
            descriptor_version: 0,
            descriptor_hash: None,
            embedding: None,
            embedding_model_id: None,
            embedding_dim: None,
            embedding_task: None,
        }
    }

    proptest! {
        /// A trace stored with an arbitrary in-range quality score and
        /// success flag reads back with both fields intact, and
        /// `get_traces_above_quality` honors the `>=` boundary exactly.
        #[test]
        fn stored_quality_and_success_round_trip(success in any::<bool>(), quality in 0f64..=1f64) {
            let engine = StorageEngine::open_in_memory().unwrap();
            let id = uuid::Uuid::new_v4().to_string();
            store_trace(&engine, &trace(id.clone(), success, quality)).unwrap();

            let stats = get_trace_stats(&engine).unwrap();
            prop_assert_eq!(stats.total, 1);
            prop_assert_eq!(stats.successes, if success { 1 } else { 0 });

            let above = get_traces_above_quality(&engine, quality, 10).unwrap();
            prop_assert_eq!(above.len(), 1);
            prop_assert!((above[0].quality_score - quality).abs() < 1e-9);

            let failed = get_failed_traces(&engine, 10).unwrap();
            prop_assert_eq!(failed.len(), if success { 0 } else { 1 });
        }
    }
}
