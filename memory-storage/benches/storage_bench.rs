use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::collections::HashMap;

use memory_core::{Direction, KnowledgeLink};
use memory_storage::queries::{fact_ops, link_ops, vector_ops};
use memory_storage::StorageEngine;

fn bench_vector_semantic_recall(c: &mut Criterion) {
    let engine = StorageEngine::open_in_memory().unwrap();
    for i in 0..500 {
        let vec = vec![(i as f32).sin(), (i as f32).cos(), i as f32 / 500.0];
        vector_ops::store_vector_with_embedding(
            &engine,
            &format!("content {i}"),
            &HashMap::new(),
            &vec,
            "bench-model",
            "query",
        )
        .unwrap();
    }

    c.bench_function("vector_recall_semantic_500", |b| {
        b.iter(|| {
            vector_ops::vector_recall_semantic(&engine, &[1.0, 0.0, 0.0], 10).unwrap();
        });
    });
}

fn bench_bfs_traversal(c: &mut Criterion) {
    let engine = StorageEngine::open_in_memory().unwrap();
    for i in 0..200 {
        link_ops::store_link(
            &engine,
            &KnowledgeLink {
                entity_a: format!("n{i}"),
                relation: "next".to_string(),
                entity_b: format!("n{}", i + 1),
                weight: 1.0,
                metadata: HashMap::new(),
            },
        )
        .unwrap();
    }

    c.bench_function("bfs_traverse_path_200_hops", |b| {
        b.iter(|| {
            let _ = link_ops::traverse_path(&engine, "n0", "n150", 200);
        });
    });
}

fn bench_query_links(c: &mut Criterion) {
    let engine = StorageEngine::open_in_memory().unwrap();
    for i in 0..300 {
        link_ops::store_link(
            &engine,
            &KnowledgeLink {
                entity_a: "hub".to_string(),
                relation: "connects".to_string(),
                entity_b: format!("leaf{i}"),
                weight: 1.0,
                metadata: HashMap::new(),
            },
        )
        .unwrap();
    }

    c.bench_function("query_links_outgoing_300", |b| {
        b.iter(|| {
            link_ops::query_links(&engine, "hub", Direction::Outgoing).unwrap();
        });
    });
}

/// Rebuilds 500 archivable facts per iteration (setup excluded from timing)
/// and times the sweep that moves them into `archived_facts`.
fn bench_archive_sweep(c: &mut Criterion) {
    c.bench_function("archive_old_facts_500", |b| {
        b.iter_batched(
            || {
                let engine = StorageEngine::open_in_memory().unwrap();
                for i in 0..500 {
                    fact_ops::store_fact(&engine, &format!("p{i}"), &[], "t", 0).unwrap();
                }
                engine
                    .pool()
                    .with_writer(|conn| {
                        conn.execute_batch(
                            "UPDATE cold_storage SET last_accessed = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '-100 days')",
                        )?;
                        Ok(())
                    })
                    .unwrap();
                engine
            },
            |engine| {
                fact_ops::archive_old_facts(&engine, 90, 5).unwrap();
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_vector_semantic_recall,
    bench_bfs_traversal,
    bench_query_links,
    bench_archive_sweep
);
criterion_main!(benches);
