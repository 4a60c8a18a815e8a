//! A deterministic embedding engine for tests and local development: hashes
//! the input text into a fixed-width vector instead of calling out to a
//! real model. Two calls on the same text always produce the same vector,
//! which is what reflection's "did the embedding change" comparisons need.

use memory_core::{EmbeddingEngine, MemoryResult};

pub struct MockEmbeddingEngine {
    dim: usize,
    model_name: String,
}

impl MockEmbeddingEngine {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            model_name: format!("mock-{dim}d"),
        }
    }
}

impl EmbeddingEngine for MockEmbeddingEngine {
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        Ok(hash_to_vector(text, self.dim))
    }

    fn dimensions(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

/// Deterministically spreads `text`'s hash across `dim` components in
/// `[-1.0, 1.0]` — one sub-hash per component rather than chunking a
/// single digest, so `dim` isn't bounded by the hash's output width.
fn hash_to_vector(text: &str, dim: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(dim);
    for i in 0..dim {
        let hash = blake3::hash(format!("{text}\0{i}").as_bytes());
        let bytes = hash.as_bytes();
        let n = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        out.push((n as f32 / u32::MAX as f32) * 2.0 - 1.0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_embeds_identically() {
        let engine = MockEmbeddingEngine::new(8);
        let a = engine.embed("hello").await.unwrap();
        let b = engine.embed("hello").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[tokio::test]
    async fn different_text_embeds_differently() {
        let engine = MockEmbeddingEngine::new(8);
        let a = engine.embed("hello").await.unwrap();
        let b = engine.embed("goodbye").await.unwrap();
        assert_ne!(a, b);
    }
}
