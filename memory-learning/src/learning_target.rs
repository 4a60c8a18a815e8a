//! [`ReflectionTarget`] implementation for the learning tier.

use memory_core::{EmbeddingTask, Learning, MemoryResult};
use memory_embeddings::reflect::ReflectionTarget;
use memory_embeddings::{derive_learning_handle, LEARNING_HANDLE_VERSION};
use memory_storage::StorageEngine;

use crate::learning_ops;

/// Marker type wiring `Learning` into the shared reflection cycle.
pub struct LearningReflection;

impl ReflectionTarget for LearningReflection {
    type Row = Learning;

    fn embedding_task() -> EmbeddingTask {
        EmbeddingTask::KnowledgeAtom
    }

    fn descriptor_version() -> i64 {
        LEARNING_HANDLE_VERSION
    }

    fn rows_needing_descriptor(engine: &StorageEngine, limit: usize) -> MemoryResult<Vec<Learning>> {
        learning_ops::learnings_needing_handle(engine, LEARNING_HANDLE_VERSION, limit)
    }

    fn rows_needing_embedding(
        engine: &StorageEngine,
        model_id: &str,
        dim: i64,
        task: &str,
        limit: usize,
    ) -> MemoryResult<Vec<Learning>> {
        learning_ops::learnings_needing_embedding(engine, model_id, dim, task, limit)
    }

    fn row_id(row: &Learning) -> String {
        row.id.to_string()
    }

    // The spec's backlog-pressure policy names "successful traces" as the
    // class a loaded cycle skips; learnings carry no analogous outcome
    // flag, so none are skipped here and the batch-size shrink is the only
    // pressure response that applies to this tier.
    fn row_is_success(_row: &Learning) -> bool {
        false
    }

    fn row_descriptor_source(row: &Learning) -> String {
        row.semantic_handle.clone().unwrap_or_else(|| derive_learning_handle(row))
    }

    fn apply_descriptor(engine: &StorageEngine, id: &str, descriptor: &str, hash: &str, version: i64) -> MemoryResult<()> {
        learning_ops::apply_handle(engine, id, descriptor, hash, version)
    }

    fn apply_embedding(engine: &StorageEngine, id: &str, embedding: &[f32], model_id: &str, task: &str) -> MemoryResult<()> {
        learning_ops::apply_embedding(engine, id, embedding, model_id, task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn learning() -> Learning {
        Learning {
            id: 0,
            shard_type: "coder".into(),
            fact_predicate: "prefers_pattern".into(),
            fact_args: vec![json!("early_return")],
            confidence: 0.9,
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
    fn handle_backlog_and_apply_round_trip() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let id = learning_ops::save(&engine, &learning()).unwrap();

        let stale = LearningReflection::rows_needing_descriptor(&engine, 10).unwrap();
        assert_eq!(stale.len(), 1);

        let handle = LearningReflection::row_descriptor_source(&stale[0]);
        assert!(handle.contains("prefers_pattern"));

        LearningReflection::apply_descriptor(&engine, &id.to_string(), &handle, "hash", LearningReflection::descriptor_version())
            .unwrap();
        assert!(LearningReflection::rows_needing_descriptor(&engine, 10).unwrap().is_empty());
    }
}
