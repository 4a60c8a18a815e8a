//! [`ReflectionTarget`] implementation for the reasoning-trace tier.

use memory_core::{EmbeddingTask, MemoryResult, ReasoningTrace};
use memory_storage::queries::trace_ops;
use memory_storage::StorageEngine;

use crate::descriptor;
use crate::reflect::ReflectionTarget;

/// Marker type wiring `ReasoningTrace` into the shared reflection cycle.
pub struct TraceReflection;

impl ReflectionTarget for TraceReflection {
    type Row = ReasoningTrace;

    fn embedding_task() -> EmbeddingTask {
        EmbeddingTask::PromptAtom
    }

    fn descriptor_version() -> i64 {
        descriptor::TRACE_DESCRIPTOR_VERSION
    }

    fn rows_needing_descriptor(engine: &StorageEngine, limit: usize) -> MemoryResult<Vec<ReasoningTrace>> {
        trace_ops::traces_needing_descriptor(engine, descriptor::TRACE_DESCRIPTOR_VERSION, limit)
    }

    fn rows_needing_embedding(
        engine: &StorageEngine,
        model_id: &str,
        dim: i64,
        task: &str,
        limit: usize,
    ) -> MemoryResult<Vec<ReasoningTrace>> {
        trace_ops::traces_needing_embedding(engine, model_id, dim, task, limit)
    }

    fn row_id(row: &ReasoningTrace) -> String {
        row.id.clone()
    }

    fn row_is_success(row: &ReasoningTrace) -> bool {
        row.success
    }

    fn row_descriptor_source(row: &ReasoningTrace) -> String {
        row.summary_descriptor
            .clone()
            .unwrap_or_else(|| descriptor::derive_trace_descriptor(row))
    }

    fn apply_descriptor(engine: &StorageEngine, id: &str, descriptor: &str, hash: &str, version: i64) -> MemoryResult<()> {
        trace_ops::apply_descriptor(engine, id, descriptor, hash, version)
    }

    fn apply_embedding(engine: &StorageEngine, id: &str, embedding: &[f32], model_id: &str, task: &str) -> MemoryResult<()> {
        trace_ops::apply_embedding(engine, id, embedding, model_id, task)
    }
}
