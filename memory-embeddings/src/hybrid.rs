//! Engine-aware glue over the vector tier: everything in
//! `memory_storage::queries::vector_ops` takes an already-computed
//! embedding, because that crate's API is synchronous and the embedding
//! call is async. This module is where the `await` happens.

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use memory_core::{EmbeddingEngine, EmbeddingTask, MemoryResult, ReflectionCycleStats, VectorEntry};
use memory_storage::queries::vector_ops;
use memory_storage::StorageEngine;

/// Compute an embedding for `content` and store it alongside the content in
/// one call.
pub async fn store_vector_with_embedding<E: EmbeddingEngine>(
    engine: &StorageEngine,
    embedder: &E,
    content: &str,
    metadata: &HashMap<String, Value>,
    task: EmbeddingTask,
) -> MemoryResult<i64> {
    let embedding = embedder.embed_with_task(content, task).await?;
    vector_ops::store_vector_with_embedding(engine, content, metadata, &embedding, embedder.name(), task.as_str())
}

/// Store a batch of `(content, metadata)` pairs, amortizing the engine
/// round-trip into one `embed_batch` call rather than one per item.
pub async fn store_vector_batch_with_embedding<E: EmbeddingEngine>(
    engine: &StorageEngine,
    embedder: &E,
    items: &[(String, HashMap<String, Value>)],
    task: EmbeddingTask,
) -> MemoryResult<Vec<i64>> {
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let texts: Vec<String> = items.iter().map(|(content, _)| content.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).await?;
    let mut ids = Vec::with_capacity(items.len());
    for ((content, metadata), embedding) in items.iter().zip(embeddings) {
        let id = vector_ops::store_vector_with_embedding(
            engine,
            content,
            metadata,
            &embedding,
            embedder.name(),
            task.as_str(),
        )?;
        ids.push(id);
    }
    Ok(ids)
}

/// Semantic recall with the full fallback chain: embed the query with the
/// configured engine and run cosine recall; if embedding the query fails,
/// fall back to tokenized lexical recall rather than surfacing an error to
/// a caller who just wants *some* results back.
pub async fn vector_recall_semantic_hybrid<E: EmbeddingEngine>(
    engine: &StorageEngine,
    embedder: &E,
    query: &str,
    limit: usize,
) -> MemoryResult<Vec<(VectorEntry, f64)>> {
    match embedder.embed_with_task(query, EmbeddingTask::Query).await {
        Ok(query_embedding) => vector_ops::vector_recall_semantic(engine, &query_embedding, limit),
        Err(e) => {
            warn!(error = %e, "query embedding failed, falling back to lexical recall");
            let lexical = vector_ops::vector_recall(engine, query, limit)?;
            Ok(lexical.into_iter().map(|entry| (entry, 0.0)).collect())
        }
    }
}

/// Force every prompt atom lacking a current `(model_id, dim, PromptAtom)`
/// embedding to be re-embedded, one `embed_batch` call per `batch_size`
/// atoms, until the backlog is drained. Used for a one-off bulk re-embed
/// (e.g. after swapping the configured embedding model) rather than the
/// periodic reflection cycle, which paces itself against a backlog
/// watermark instead of draining to zero in one call.
pub async fn reembed_all_prompt_atoms_force<E: EmbeddingEngine>(
    engine: &StorageEngine,
    embedder: &E,
    batch_size: usize,
) -> MemoryResult<ReflectionCycleStats> {
    let model_id = embedder.name().to_string();
    let dim = embedder.dimensions() as i64;
    let task = EmbeddingTask::PromptAtom;
    let mut stats = ReflectionCycleStats::default();

    loop {
        let batch = vector_ops::vectors_needing_embedding(engine, &model_id, dim, task.as_str(), batch_size)?;
        if batch.is_empty() {
            break;
        }
        stats.candidates_scanned += batch.len();
        let texts: Vec<String> = batch.iter().map(|entry| entry.content.clone()).collect();
        match embedder.embed_batch(&texts).await {
            Ok(vectors) if vectors.len() == batch.len() => {
                for (entry, vector) in batch.iter().zip(vectors) {
                    match vector_ops::apply_vector_embedding(engine, entry.id, &vector, &model_id, task.as_str()) {
                        Ok(()) => stats.reembedded += 1,
                        Err(e) => {
                            warn!(id = entry.id, error = %e, "failed to persist forced re-embedding");
                            stats.failed += 1;
                        }
                    }
                }
            }
            _ => {
                for entry in &batch {
                    match embedder.embed_with_task(&entry.content, task).await {
                        Ok(vector) => {
                            match vector_ops::apply_vector_embedding(engine, entry.id, &vector, &model_id, task.as_str()) {
                                Ok(()) => stats.reembedded += 1,
                                Err(e) => {
                                    warn!(id = entry.id, error = %e, "failed to persist forced re-embedding");
                                    stats.failed += 1;
                                }
                            }
                        }
                        Err(e) => {
                            warn!(id = entry.id, error = %e, "forced re-embedding failed, row stays unembedded");
                            stats.failed += 1;
                        }
                    }
                }
            }
        }
        if batch.len() < batch_size {
            break;
        }
    }
    Ok(stats)
}
