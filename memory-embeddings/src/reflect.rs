//! The generic shape of a reflection cycle and the background worker that
//! runs it on a timer.
//!
//! Traces and learnings need the identical cycle — snapshot the engine's
//! triple, size the batch against backlog pressure, regenerate stale
//! descriptors, re-embed what changed, and never let a per-row failure
//! abort the cycle. Rather than copy that shape twice, [`ReflectionTarget`]
//! names the handful of operations that differ per tier and
//! [`run_cycle`]/[`ReflectionWorker`] are written once against the trait.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use memory_core::{EmbeddingEngine, EmbeddingTask, MemoryResult, ReflectionConfig, ReflectionCycleStats};
use memory_storage::codec::descriptor_hash;
use memory_storage::StorageEngine;

/// The operations a reflectable tier (reasoning traces, learnings) must
/// supply. Everything else about running a cycle is shared.
pub trait ReflectionTarget {
    type Row;

    fn embedding_task() -> EmbeddingTask;
    fn descriptor_version() -> i64;

    /// Rows whose descriptor is missing or older than
    /// [`Self::descriptor_version`], oldest first.
    fn rows_needing_descriptor(engine: &StorageEngine, limit: usize) -> MemoryResult<Vec<Self::Row>>;

    /// Rows with a current descriptor but an embedding that doesn't match
    /// `(model_id, dim, task)`.
    fn rows_needing_embedding(
        engine: &StorageEngine,
        model_id: &str,
        dim: i64,
        task: &str,
        limit: usize,
    ) -> MemoryResult<Vec<Self::Row>>;

    fn row_id(row: &Self::Row) -> String;
    fn row_is_success(row: &Self::Row) -> bool;
    fn row_descriptor_source(row: &Self::Row) -> String;

    fn apply_descriptor(engine: &StorageEngine, id: &str, descriptor: &str, hash: &str, version: i64) -> MemoryResult<()>;
    fn apply_embedding(engine: &StorageEngine, id: &str, embedding: &[f32], model_id: &str, task: &str) -> MemoryResult<()>;

    /// Approximate backlog size used for the watermark check. The default
    /// sums both queues uncapped; a tier with a cheaper direct count can
    /// override it.
    fn backlog_count(engine: &StorageEngine, model_id: &str, dim: i64, task: &str) -> MemoryResult<usize> {
        let needing_descriptor = Self::rows_needing_descriptor(engine, usize::MAX)?.len();
        let needing_embedding = Self::rows_needing_embedding(engine, model_id, dim, task, usize::MAX)?.len();
        Ok(needing_descriptor + needing_embedding)
    }
}

/// Run one reflection cycle for `T` against `engine`, using `embedder` to
/// turn descriptors into vectors. Never returns an error for a per-row
/// failure — those are logged and counted in the returned stats.
pub async fn run_cycle<T: ReflectionTarget, E: EmbeddingEngine>(
    engine: &StorageEngine,
    embedder: &E,
    config: &ReflectionConfig,
) -> MemoryResult<ReflectionCycleStats> {
    let model_id = embedder.name().to_string();
    let dim = embedder.dimensions() as i64;
    let task = T::embedding_task();
    let task_str = task.as_str();

    let backlog = T::backlog_count(engine, &model_id, dim, task_str)?;
    let over_watermark = backlog > config.backlog_watermark;
    let batch_size = if over_watermark {
        (config.batch_size / 2).max(1)
    } else {
        config.batch_size
    };
    if over_watermark {
        debug!(backlog, watermark = config.backlog_watermark, "reflection backlog over watermark, shrinking batch");
    }

    let mut stats = ReflectionCycleStats::default();

    // Pass 1: regenerate stale/missing descriptors.
    let stale = T::rows_needing_descriptor(engine, batch_size)?;
    for row in &stale {
        if over_watermark && T::row_is_success(row) {
            stats.skipped_backlog += 1;
            continue;
        }
        stats.candidates_scanned += 1;
        let id = T::row_id(row);
        let text = T::row_descriptor_source(row);
        let hash = descriptor_hash(&text);
        if let Err(e) = T::apply_descriptor(engine, &id, &text, &hash, T::descriptor_version()) {
            warn!(id, error = %e, "failed to apply reflection descriptor, will retry next cycle");
            stats.failed += 1;
        }
    }

    // Pass 2: re-embed rows whose embedding triple no longer matches.
    let stale_embeddings = T::rows_needing_embedding(engine, &model_id, dim, task_str, batch_size)?;
    let mut candidates: Vec<&T::Row> = Vec::with_capacity(stale_embeddings.len());
    for row in &stale_embeddings {
        if over_watermark && T::row_is_success(row) {
            stats.skipped_backlog += 1;
            continue;
        }
        candidates.push(row);
    }
    stats.candidates_scanned += candidates.len();

    if !candidates.is_empty() {
        let texts: Vec<String> = candidates.iter().map(|r| T::row_descriptor_source(r)).collect();
        match embedder.embed_batch(&texts).await {
            Ok(vectors) if vectors.len() == candidates.len() => {
                for (row, vector) in candidates.iter().zip(vectors) {
                    apply_one(engine, *row, &vector, &model_id, task_str, &mut stats);
                }
            }
            _ => {
                // Batch failed, or returned a mismatched count — fall back
                // to per-item embedding so a single bad row doesn't stall
                // the rest of the batch.
                for row in &candidates {
                    let id = T::row_id(row);
                    match embedder.embed_with_task(&T::row_descriptor_source(row), task).await {
                        Ok(vector) => apply_one(engine, row, &vector, &model_id, task_str, &mut stats),
                        Err(e) => {
                            warn!(id, error = %e, "embedding failed, row stays unembedded until next cycle");
                            stats.failed += 1;
                        }
                    }
                }
            }
        }
    }

    info!(
        candidates = stats.candidates_scanned,
        reembedded = stats.reembedded,
        failed = stats.failed,
        skipped = stats.skipped_backlog,
        "reflection cycle complete"
    );
    Ok(stats)
}

fn apply_one<T: ReflectionTarget>(
    engine: &StorageEngine,
    row: &T::Row,
    vector: &[f32],
    model_id: &str,
    task: &str,
    stats: &mut ReflectionCycleStats,
) {
    let id = T::row_id(row);
    match T::apply_embedding(engine, &id, vector, model_id, task) {
        Ok(()) => stats.reembedded += 1,
        Err(e) => {
            warn!(id, error = %e, "failed to persist re-embedding, will retry next cycle");
            stats.failed += 1;
        }
    }
}

/// A background loop that calls [`run_cycle`] on a fixed interval. Each
/// cycle is capped at 45 seconds; `start` is idempotent, and `stop` gives
/// an in-flight cycle up to two seconds to finish before abandoning the
/// join.
pub struct ReflectionWorker<T: ReflectionTarget, E: EmbeddingEngine + 'static> {
    engine: Arc<StorageEngine>,
    embedder: Arc<E>,
    config: std::sync::RwLock<ReflectionConfig>,
    handle: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    stop: Arc<Notify>,
    _marker: PhantomData<fn() -> T>,
}

const CYCLE_DEADLINE: Duration = Duration::from_secs(45);
const STOP_GRACE: Duration = Duration::from_secs(2);

impl<T: ReflectionTarget + Send + Sync + 'static, E: EmbeddingEngine + 'static> ReflectionWorker<T, E>
where
    T::Row: Send,
{
    pub fn new(engine: Arc<StorageEngine>, embedder: Arc<E>, config: ReflectionConfig) -> Arc<Self> {
        Arc::new(Self {
            engine,
            embedder,
            config: std::sync::RwLock::new(config),
            handle: std::sync::Mutex::new(None),
            stop: Arc::new(Notify::new()),
            _marker: PhantomData,
        })
    }

    /// Replace the live tunables; the next cycle picks them up at its
    /// snapshot point.
    pub fn reconfigure(&self, config: ReflectionConfig) {
        *self.config.write().expect("reflection config lock poisoned") = config;
    }

    /// Start the background loop. A no-op (returns `false`) if it is
    /// already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut handle_guard = self.handle.lock().expect("reflection handle lock poisoned");
        if handle_guard.is_some() {
            return false;
        }
        let worker = Arc::clone(self);
        *handle_guard = Some(tokio::spawn(async move { worker.run_loop().await }));
        true
    }

    async fn run_loop(self: Arc<Self>) {
        loop {
            let interval_seconds = self.config.read().expect("reflection config lock poisoned").interval_seconds;
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(interval_seconds)) => {
                    self.run_one_cycle().await;
                }
                _ = self.stop.notified() => {
                    debug!("reflection worker received stop signal");
                    break;
                }
            }
        }
    }

    async fn run_one_cycle(&self) {
        let config = self.config.read().expect("reflection config lock poisoned").clone();
        if !config.enabled {
            return;
        }
        match tokio::time::timeout(CYCLE_DEADLINE, run_cycle::<T, E>(&self.engine, &self.embedder, &config)).await {
            Ok(Ok(_stats)) => {}
            Ok(Err(e)) => warn!(error = %e, "reflection cycle aborted"),
            Err(_) => warn!("reflection cycle exceeded its 45s deadline, retrying next tick"),
        }
    }

    /// Signal the loop to stop and wait up to two seconds for the current
    /// cycle to drain. Safe to call when the worker was never started.
    pub async fn stop(&self) {
        self.stop.notify_one();
        let handle = self.handle.lock().expect("reflection handle lock poisoned").take();
        if let Some(handle) = handle {
            let _ = tokio::time::timeout(STOP_GRACE, handle).await;
        }
    }
}
