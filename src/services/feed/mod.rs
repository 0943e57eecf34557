use crate::config::FeedConfig;
use crate::models::{ChunkMetadata, ContentId, ContentRecord, UserRef};
use crate::services::content::ContentCatalog;
use crate::services::embedding::EmbeddingProvider;
use crate::services::interest::InterestService;
use crate::services::vector_db::{QueryOptions, ScoredDocument, VectorStore};
use crate::utils::validation;
use anyhow::Result;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Builds the personalized feed: retrieves candidate chunks near a query
/// vector, resolves them to parent posts, drops everything the user has
/// already seen or written, and pages the result. Also maintains the chunk
/// documents the retrieval runs against.
pub struct FeedService {
    content_index: Arc<dyn VectorStore>,
    interest: Arc<InterestService>,
    catalog: Arc<dyn ContentCatalog>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: FeedConfig,
}

impl FeedService {
    pub fn new(
        content_index: Arc<dyn VectorStore>,
        interest: Arc<InterestService>,
        catalog: Arc<dyn ContentCatalog>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: FeedConfig,
    ) -> Self {
        Self {
            content_index,
            interest,
            catalog,
            embedder,
            config,
        }
    }

    fn query_options(&self, pool_size: usize) -> QueryOptions {
        QueryOptions {
            fetch_k: Some(pool_size * self.config.fetch_factor),
            use_mmr: self.config.use_mmr,
            mmr_lambda: self.config.mmr_lambda,
        }
    }

    /// Maps retrieved chunks to parent post ids, dropping exclusions and
    /// duplicates while keeping the index's relevance order. Chunks with
    /// malformed metadata are skipped, never fatal.
    fn resolve_novel_ids(chunks: &[ScoredDocument], exclude: &HashSet<i64>) -> Vec<i64> {
        let mut seen = HashSet::new();
        let mut novel = Vec::new();

        for doc in chunks {
            let metadata = match serde_json::from_value::<ChunkMetadata>(doc.metadata.clone()) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Skipping chunk `{}` with malformed metadata: {}", doc.id, e);
                    continue;
                }
            };

            let Some(post_id) = metadata.parent_post() else {
                warn!(
                    "Skipping chunk `{}`: {} has no parent post reference",
                    doc.id, metadata.original_doc_id
                );
                continue;
            };

            if exclude.contains(&post_id) || !seen.insert(post_id) {
                continue;
            }
            novel.push(post_id);
        }

        novel
    }

    /// Candidate retrieval with bounded pool expansion: query, filter, and if
    /// fewer than `min_novel` post ids survive, grow the pool and requery.
    /// Exhausting the rounds returns whatever was found; a short feed beats
    /// an error or an unbounded loop.
    pub async fn novel_candidate_ids(
        &self,
        query_vector: &[f32],
        exclude: &HashSet<i64>,
        min_novel: usize,
    ) -> Result<Vec<i64>> {
        let base = self.config.candidate_pool_size;
        let mut pool_size = base;
        let mut novel = Vec::new();

        for round in 0..self.config.max_pool_rounds {
            let chunks = match self
                .content_index
                .query(query_vector, pool_size, self.query_options(pool_size))
                .await
            {
                Ok(chunks) => chunks,
                Err(e) => {
                    error!("Vector index query failed; returning empty candidate set: {}", e);
                    return Ok(Vec::new());
                }
            };

            // each round refilters the fresh result set in full, so the final
            // ordering is always the index's own relevance order
            novel = Self::resolve_novel_ids(&chunks, exclude);

            if novel.len() >= min_novel {
                break;
            }

            if chunks.len() < pool_size {
                // the index has no more documents; expanding cannot help
                break;
            }

            if round + 1 < self.config.max_pool_rounds {
                info!(
                    "Pool of {} candidates yielded {} novel posts (need {}); expanding",
                    pool_size,
                    novel.len(),
                    min_novel
                );
                pool_size += base;
            } else {
                info!(
                    "Exhausted {} expansion rounds with {} novel posts (need {})",
                    self.config.max_pool_rounds,
                    novel.len(),
                    min_novel
                );
            }
        }

        Ok(novel)
    }

    /// One page of personalized recommendations, as ordered post ids. An
    /// empty result means either a cold-start user (no vector, logged) or no
    /// unseen posts left.
    pub async fn recommended_post_ids(
        &self,
        user: &UserRef,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<i64>> {
        validation::validate_page_params(page, page_size)?;

        let Some(query_vector) = self.interest.interest_vector(user).await? else {
            info!(
                "No interest vector for user {}; returning unpersonalized empty feed",
                user.username
            );
            return Ok(Vec::new());
        };

        let mut exclude = self.catalog.viewed_post_ids(user.id).await?;
        exclude.extend(self.catalog.authored_post_ids(user.id).await?);

        let min_novel = page * page_size;
        let novel = self
            .novel_candidate_ids(&query_vector, &exclude, min_novel)
            .await?;

        let offset = (page - 1) * page_size;
        let page_ids: Vec<i64> = novel.into_iter().skip(offset).take(page_size).collect();

        if page_ids.is_empty() {
            info!(
                "No new recommendations for user {} on page {}",
                user.username, page
            );
        } else {
            info!(
                "Returning {} recommendations for user {} on page {}",
                page_ids.len(),
                user.username,
                page
            );
        }

        Ok(page_ids)
    }

    /// Same page, hydrated through the catalog's order-preserving fetch.
    pub async fn recommended_posts(
        &self,
        user: &UserRef,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<ContentRecord>> {
        let ids = self.recommended_post_ids(user, page, page_size).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.catalog.posts_by_ids(&ids).await
    }

    /// Ad hoc semantic search: the retrieval pipeline driven by an embedded
    /// text query instead of an interest vector, with nothing excluded.
    pub async fn search_post_ids(
        &self,
        query: &str,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<i64>> {
        validation::validate_page_params(page, page_size)?;

        if query.trim().is_empty() {
            return Err(anyhow::anyhow!("Search query cannot be empty"));
        }

        let embedding = match self.embedder.embed(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                error!("Failed to embed search query; returning no results: {}", e);
                return Ok(Vec::new());
            }
        };

        let novel = self
            .novel_candidate_ids(&embedding, &HashSet::new(), page * page_size)
            .await?;

        let offset = (page - 1) * page_size;
        Ok(novel.into_iter().skip(offset).take(page_size).collect())
    }

    pub async fn search_posts(
        &self,
        query: &str,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<ContentRecord>> {
        let ids = self.search_post_ids(query, page, page_size).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.catalog.posts_by_ids(&ids).await
    }

    /// Embeds pre-split chunks of a content item and upserts them under
    /// `{doc}_chunk_{i}`. Splitting happens upstream; this only attaches
    /// provenance metadata and writes. Failures are contained per chunk.
    pub async fn index_chunks(
        &self,
        doc: ContentId,
        parent_post_id: Option<i64>,
        author: &UserRef,
        chunks: &[String],
    ) -> Result<()> {
        if chunks.is_empty() {
            warn!("No chunks supplied for {}; nothing to index", doc);
            return Ok(());
        }

        let mut indexed = 0;
        for (i, text) in chunks.iter().enumerate() {
            let embedding = match self.embedder.embed(text).await {
                Ok(embedding) => embedding,
                Err(e) => {
                    error!("Failed to embed chunk {} of {}: {}", i, doc, e);
                    continue;
                }
            };

            let metadata = ChunkMetadata {
                original_doc_id: doc,
                chunk_index: i,
                source_type: doc.kind,
                parent_post_id,
                author_username: author.username.clone(),
                created_at: Utc::now(),
            };

            match self
                .content_index
                .upsert(&doc.chunk_key(i), embedding, serde_json::to_value(&metadata)?)
                .await
            {
                Ok(()) => indexed += 1,
                Err(e) => error!("Failed to index chunk {} of {}: {}", i, doc, e),
            }
        }

        info!("Indexed {}/{} chunks for {}", indexed, chunks.len(), doc);
        Ok(())
    }

    /// Removes every chunk belonging to a content item, matched by the
    /// `original_doc_id` metadata field.
    pub async fn remove_content(&self, doc: ContentId) -> Result<()> {
        if let Err(e) = self
            .content_index
            .delete_matching("original_doc_id", &serde_json::json!(doc.to_string()))
            .await
        {
            error!("Failed to delete chunks for {}: {}", doc, e);
        }
        Ok(())
    }
}
