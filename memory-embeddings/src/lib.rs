//! Embedding-engine seam, descriptor/handle derivation, hybrid recall, and
//! the background reflection workers that keep trace and learning
//! embeddings current.
//!
//! `memory-core` defines the [`memory_core::EmbeddingEngine`] trait and
//! leaves everything that awaits it to this crate: the query-side glue in
//! [`hybrid`], the descriptor generation in [`descriptor`], and the
//! generic reflection cycle in [`reflect`] (instantiated per tier by
//! [`trace_target`]; the learning tier's instantiation lives in
//! `memory-learning`, which depends on this crate).

pub mod descriptor;
pub mod hybrid;
pub mod mock;
pub mod reflect;
pub mod trace_target;

pub use descriptor::{
    derive_learning_handle, derive_trace_descriptor, learning_handle_hash, trace_descriptor_hash,
    LEARNING_HANDLE_VERSION, TRACE_DESCRIPTOR_VERSION,
};
pub use hybrid::{
    reembed_all_prompt_atoms_force, store_vector_batch_with_embedding, store_vector_with_embedding,
    vector_recall_semantic_hybrid,
};
pub use mock::MockEmbeddingEngine;
pub use reflect::{run_cycle, ReflectionTarget, ReflectionWorker};
pub use trace_target::TraceReflection;
