use std::sync::Arc;
use std::time::Duration;

use memory_core::ReflectionConfig;
use memory_embeddings::{reembed_all_prompt_atoms_force, run_cycle, MockEmbeddingEngine, ReflectionWorker, TraceReflection};
use memory_storage::queries::{trace_ops, vector_ops};
use memory_storage::StorageEngine;

fn trace(id: &str) -> memory_core::ReasoningTrace {
    memory_core::ReasoningTrace {
        id: id.into(),
        shard_id: "shard-1".into(),
        shard_type: "coder".into(),
        shard_category: "backend".into(),
        session_id: "s1".into(),
        task_context: "refactor module".into(),
        system_prompt: "".into(),
        user_prompt: "".into(),
        response: "".into(),
        success: true,
        error_message: None,
        quality_score: 0.9,
        learning_notes: vec!["prefer early returns".into()],
        duration_ms: 10,
        tokens_used: None,
        created_at: chrono::Utc::now(),
        summary_descriptor: None,
        descriptor_version: 0,
        descriptor_hash: None,
        embedding: None,
        embedding_model_id: None,
        embedding_dim: None,
        embedding_task: None,
    }
}

#[tokio::test]
async fn one_cycle_derives_descriptor_and_embedding_for_a_fresh_trace() {
    let engine = StorageEngine::open_in_memory().unwrap();
    trace_ops::store_trace(&engine, &trace("t1")).unwrap();

    let embedder = MockEmbeddingEngine::new(4);
    let config = ReflectionConfig {
        batch_size: 8,
        ..ReflectionConfig::default()
    };

    let stats = run_cycle::<TraceReflection, _>(&engine, &embedder, &config).await.unwrap();
    assert_eq!(stats.failed, 0);

    let stats = run_cycle::<TraceReflection, _>(&engine, &embedder, &config).await.unwrap();
    assert_eq!(stats.reembedded, 1);

    let remaining = trace_ops::traces_needing_embedding(&engine, "mock-4d", 4, "prompt_atom", 10).unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn forced_reembed_of_one_hundred_prompt_atoms_runs_in_four_batches_of_thirty_two() {
    let engine = StorageEngine::open_in_memory().unwrap();
    for i in 0..100 {
        vector_ops::store_vector(&engine, &format!("atom {i}"), &Default::default()).unwrap();
    }

    let embedder = MockEmbeddingEngine::new(4);
    let stats = reembed_all_prompt_atoms_force(&engine, &embedder, 32).await.unwrap();

    assert_eq!(stats.candidates_scanned, 100);
    assert_eq!(stats.reembedded, 100);

    let all = vector_ops::vectors_needing_embedding(&engine, "mock-4d", 4, "prompt_atom", 200).unwrap();
    assert!(all.is_empty());

    // Every row's embedding blob is 4 little-endian f32s (16 bytes) tagged
    // with the prompt-atom task.
    let sample = vector_ops::vector_recall(&engine, "atom 0", 1).unwrap();
    let entry = &sample[0];
    assert_eq!(entry.embedding.as_ref().unwrap().len(), 16);
    assert_eq!(entry.embedding_task.as_deref(), Some("prompt_atom"));
}

#[tokio::test]
async fn worker_start_is_idempotent_and_stop_is_graceful() {
    let engine = Arc::new(StorageEngine::open_in_memory().unwrap());
    trace_ops::store_trace(&engine, &trace("t1")).unwrap();

    let embedder = Arc::new(MockEmbeddingEngine::new(4));
    let config = ReflectionConfig {
        interval_seconds: 3600,
        ..ReflectionConfig::default()
    };
    let worker = ReflectionWorker::<TraceReflection, _>::new(Arc::clone(&engine), embedder, config);

    assert!(worker.start());
    assert!(!worker.start());

    tokio::time::sleep(Duration::from_millis(10)).await;
    worker.stop().await;
}
