use memory_core::{Learning, ReflectionConfig};
use memory_embeddings::{run_cycle, MockEmbeddingEngine};
use memory_learning::{learning_ops, LearningReflection, LearningStore};
use serde_json::json;

fn learning(predicate: &str) -> Learning {
    Learning {
        id: 0,
        shard_type: "coder".into(),
        fact_predicate: predicate.into(),
        fact_args: vec![json!("early_return")],
        confidence: 0.9,
        learned_at: chrono::Utc::now(),
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
fn each_shard_type_gets_its_own_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = LearningStore::new(dir.path());

    let coder = store.shard("coder").unwrap();
    learning_ops::save(&coder, &learning("prefers_pattern")).unwrap();

    let planner = store.shard("planner").unwrap();
    assert!(learning_ops::load(&planner, "prefers_pattern").unwrap().is_empty());
    assert_eq!(learning_ops::load(&coder, "prefers_pattern").unwrap().len(), 1);
}

#[tokio::test]
async fn reflection_cycle_derives_handle_then_embedding_for_a_learning() {
    let dir = tempfile::tempdir().unwrap();
    let store = LearningStore::new(dir.path());
    let coder = store.shard("coder").unwrap();
    learning_ops::save(&coder, &learning("prefers_pattern")).unwrap();

    let embedder = MockEmbeddingEngine::new(4);
    let config = ReflectionConfig {
        batch_size: 8,
        ..ReflectionConfig::default()
    };

    run_cycle::<LearningReflection, _>(&coder, &embedder, &config).await.unwrap();
    let stats = run_cycle::<LearningReflection, _>(&coder, &embedder, &config).await.unwrap();
    assert_eq!(stats.reembedded, 1);

    let remaining = learning_ops::learnings_needing_embedding(&coder, "mock-4d", 4, "knowledge_atom", 10).unwrap();
    assert!(remaining.is_empty());
}

#[test]
fn decay_confidence_applies_across_a_whole_shard() {
    let dir = tempfile::tempdir().unwrap();
    let store = LearningStore::new(dir.path());
    let coder = store.shard("coder").unwrap();
    learning_ops::save(&coder, &learning("a")).unwrap();
    learning_ops::save(&coder, &learning("b")).unwrap();

    let touched = learning_ops::decay_confidence(&coder, 0.9, 0.0).unwrap();
    assert_eq!(touched, 2);
}
