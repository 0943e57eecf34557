use anyhow::{anyhow, Result};
use dashmap::DashMap;
use nalgebra::DVector;
use serde_json::Value;
use std::cmp::Ordering;
use tracing::{debug, info};

/// A document held by the index: an embedding plus free-form metadata.
/// Content chunks carry their provenance in metadata; user profile markers
/// have no text at all and exist purely for the embedding payload.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: Value,
}

#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub id: String,
    pub score: f32,
    pub metadata: Value,
}

#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    /// Pool fetched before any re-ranking; defaults to `2k` under MMR.
    pub fetch_k: Option<usize>,
    /// Diversity-aware re-ranking, as a caller-side index option. Retrieval
    /// callers treat the returned order as authoritative either way.
    pub use_mmr: bool,
    /// MMR relevance/diversity trade-off: 1.0 is pure relevance.
    pub mmr_lambda: f32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            fetch_k: None,
            use_mmr: false,
            mmr_lambda: 0.5,
        }
    }
}

/// Persistent nearest-neighbor index over embedded documents, keyed by
/// string id. Writes are upserts; `get` returns the embedding too, so marker
/// documents can be read back.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, id: &str, embedding: Vec<f32>, metadata: Value) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
    /// Delete every document whose metadata `field` equals `value`.
    async fn delete_matching(&self, field: &str, value: &Value) -> Result<()>;
    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        options: QueryOptions,
    ) -> Result<Vec<ScoredDocument>>;
    async fn get(&self, id: &str) -> Result<Option<StoredDocument>>;
}

/// In-memory `VectorStore` with exact cosine ranking. Stands in for the
/// external index in tests, benches, and single-process deployments.
pub struct MemoryVectorStore {
    collection: String,
    dimension: usize,
    documents: DashMap<String, (DVector<f32>, Value)>,
}

impl MemoryVectorStore {
    pub fn new(collection: impl Into<String>, dimension: usize) -> Self {
        let collection = collection.into();
        info!(
            "Initialized in-memory vector collection `{}` with dimension {}",
            collection, dimension
        );
        Self {
            collection,
            dimension,
            documents: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn cosine_similarity(a: &DVector<f32>, b: &DVector<f32>) -> f32 {
        let norm_a = a.norm();
        let norm_b = b.norm();

        if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            a.dot(b) / (norm_a * norm_b)
        }
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(anyhow!(
                "Vector dimension mismatch in `{}`: expected {}, got {}",
                self.collection,
                self.dimension,
                embedding.len()
            ));
        }
        Ok(())
    }

    /// Greedy maximal-marginal-relevance selection over a relevance-ranked
    /// pool. The first pick is always the most relevant candidate.
    fn mmr_select(
        query: &DVector<f32>,
        mut pool: Vec<(String, f32, DVector<f32>, Value)>,
        k: usize,
        lambda: f32,
    ) -> Vec<ScoredDocument> {
        let mut selected: Vec<(String, f32, DVector<f32>, Value)> = Vec::new();

        while selected.len() < k && !pool.is_empty() {
            let mut best_idx = 0;
            let mut best_score = f32::NEG_INFINITY;

            for (idx, (_, _, vector, _)) in pool.iter().enumerate() {
                let relevance = Self::cosine_similarity(query, vector);
                let redundancy = selected
                    .iter()
                    .map(|(_, _, chosen, _)| Self::cosine_similarity(vector, chosen))
                    .fold(0.0f32, f32::max);
                let score = lambda * relevance - (1.0 - lambda) * redundancy;

                if score > best_score {
                    best_score = score;
                    best_idx = idx;
                }
            }

            selected.push(pool.swap_remove(best_idx));
        }

        selected
            .into_iter()
            .map(|(id, score, _, metadata)| ScoredDocument { id, score, metadata })
            .collect()
    }
}

#[async_trait::async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, id: &str, embedding: Vec<f32>, metadata: Value) -> Result<()> {
        self.check_dimension(&embedding)?;
        self.documents
            .insert(id.to_string(), (DVector::from_vec(embedding), metadata));
        debug!("Upserted document `{}` into `{}`", id, self.collection);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.documents.remove(id);
        Ok(())
    }

    async fn delete_matching(&self, field: &str, value: &Value) -> Result<()> {
        let matched: Vec<String> = self
            .documents
            .iter()
            .filter(|entry| entry.value().1.get(field) == Some(value))
            .map(|entry| entry.key().clone())
            .collect();

        for id in &matched {
            self.documents.remove(id);
        }

        info!(
            "Deleted {} documents from `{}` where {}={}",
            matched.len(),
            self.collection,
            field,
            value
        );
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        options: QueryOptions,
    ) -> Result<Vec<ScoredDocument>> {
        self.check_dimension(embedding)?;

        let query = DVector::from_vec(embedding.to_vec());
        let mut ranked: Vec<(String, f32, DVector<f32>, Value)> = self
            .documents
            .iter()
            .map(|entry| {
                let (vector, metadata) = entry.value();
                let score = Self::cosine_similarity(&query, vector);
                (entry.key().clone(), score, vector.clone(), metadata.clone())
            })
            .collect();

        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        if options.use_mmr {
            let fetch_k = options.fetch_k.unwrap_or(k * 2).max(k);
            ranked.truncate(fetch_k);
            Ok(Self::mmr_select(&query, ranked, k, options.mmr_lambda))
        } else {
            ranked.truncate(k);
            Ok(ranked
                .into_iter()
                .map(|(id, score, _, metadata)| ScoredDocument { id, score, metadata })
                .collect())
        }
    }

    async fn get(&self, id: &str) -> Result<Option<StoredDocument>> {
        Ok(self.documents.get(id).map(|entry| {
            let (vector, metadata) = entry.value();
            StoredDocument {
                id: id.to_string(),
                embedding: vector.as_slice().to_vec(),
                metadata: metadata.clone(),
            }
        }))
    }
}
