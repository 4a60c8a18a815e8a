//! Short textual paraphrases ("descriptors" for traces, "handles" for
//! learnings) that reflection embeds in place of the raw row. Both are
//! versioned: bumping the constant below forces every existing row to be
//! treated as stale on the next backlog scan, regardless of its hash.

use memory_core::{Learning, ReasoningTrace};

use memory_storage::codec::descriptor_hash;

/// Current revision of [`derive_trace_descriptor`]. Bump when the
/// generation logic changes in a way that should invalidate every stored
/// descriptor.
pub const TRACE_DESCRIPTOR_VERSION: i64 = 1;

/// Current revision of [`derive_learning_handle`].
pub const LEARNING_HANDLE_VERSION: i64 = 1;

/// Paraphrase a reasoning trace from its shard, task context, outcome, and
/// the most notable learning note (or error message on failure).
pub fn derive_trace_descriptor(trace: &ReasoningTrace) -> String {
    let outcome = if trace.success { "succeeded" } else { "failed" };
    let mut descriptor = format!(
        "[{}/{}] {} — {}",
        trace.shard_type, trace.shard_category, trace.task_context, outcome
    );
    if !trace.success {
        if let Some(err) = &trace.error_message {
            descriptor.push_str(&format!(" ({err})"));
        }
    } else if let Some(note) = trace.learning_notes.first() {
        descriptor.push_str(&format!(" ({note})"));
    }
    descriptor
}

/// Hash a trace descriptor the same way every descriptor hash in the store
/// is computed, so drift detection (`descriptor_hash` column vs. a freshly
/// derived one) is a single equality check.
pub fn trace_descriptor_hash(descriptor: &str) -> String {
    descriptor_hash(descriptor)
}

/// Paraphrase a learning as `shard_type: predicate(args) [confidence N.NN]`
/// — human-readable enough to double as the embedding source text.
pub fn derive_learning_handle(learning: &Learning) -> String {
    let args = learning
        .fact_args
        .iter()
        .map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{}: {}({}) [confidence {:.2}]",
        learning.shard_type, learning.fact_predicate, args, learning.confidence
    )
}

pub fn learning_handle_hash(handle: &str) -> String {
    descriptor_hash(handle)
}
