use anyhow::Result;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::info;

/// Text embedding backend. Production deployments wrap a remote model
/// service; the call is blocking I/O and may fail, so every call site is
/// expected to contain the failure rather than surface it to end users.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn dimension(&self) -> usize;
}

/// Deterministic token-hash embedder for tests and offline runs. Not
/// semantically meaningful; identical input always yields the identical
/// unit-norm vector, which is what the test suite needs.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        info!("Initialized hashing embedder with dimension {}", dimension);
        Self { dimension }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embedding = vec![0.0f32; self.dimension];

        for token in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let hash = hasher.finish();

            let idx = (hash as usize) % self.dimension;
            let sign = if hash & 1 == 0 { 1.0 } else { -1.0 };
            embedding[idx] += sign;
        }

        crate::utils::normalize_vector(&mut embedding);
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
