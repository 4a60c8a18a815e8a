//! Seams to the two external collaborators: an embedding engine and the
//! caller's rule-engine assertion sink.

use crate::errors::MemoryResult;

/// Content-type hint passed to a task-aware embedding call. Engines that
/// don't distinguish tasks are free to ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingTask {
    PromptAtom,
    KnowledgeAtom,
    Documentation,
    Query,
}

impl EmbeddingTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingTask::PromptAtom => "prompt_atom",
            EmbeddingTask::KnowledgeAtom => "knowledge_atom",
            EmbeddingTask::Documentation => "documentation",
            EmbeddingTask::Query => "query",
        }
    }
}

/// Capability for turning text into fixed-dimension vectors.
///
/// Implemented by the caller's embedding model; the store only ever
/// consumes it. `embed_batch` exists so callers can amortize round-trips —
/// the default forwards one call at a time for implementations that don't
/// have a native batch path.
#[allow(async_fn_in_trait)]
pub trait EmbeddingEngine: Send + Sync {
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Task-aware embedding. Engines without task-specific models can
    /// ignore `task` and defer to `embed`.
    async fn embed_with_task(&self, text: &str, task: EmbeddingTask) -> MemoryResult<Vec<f32>> {
        let _ = task;
        self.embed(text).await
    }

    fn dimensions(&self) -> usize;
    fn name(&self) -> &str;
}

/// Callback used by `hydrate_knowledge_graph` to push edges into the
/// caller's rule/inference engine as `assert(predicate, args)`.
pub type AssertFn<'a> = dyn FnMut(&str, &[String]) -> MemoryResult<()> + 'a;
