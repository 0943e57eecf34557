pub mod config;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use models::*;

use anyhow::Result;
use services::content::{ContentCatalog, MemoryCatalog};
use services::embedding::{EmbeddingProvider, HashingEmbedder};
use services::feed::FeedService;
use services::interest::{InterestService, UserVectorRepository};
use services::vector_db::{MemoryVectorStore, VectorStore};
use std::sync::Arc;

/// Process-wide service context. Built once at startup with explicit handles
/// to the external collaborators and shared by cloning; no component reaches
/// for a global.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub content_index: Arc<dyn VectorStore>,
    pub user_index: Arc<dyn VectorStore>,
    pub catalog: Arc<dyn ContentCatalog>,
    pub interest_service: Arc<InterestService>,
    pub feed_service: Arc<FeedService>,
}

impl AppState {
    pub fn new(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        content_index: Arc<dyn VectorStore>,
        user_index: Arc<dyn VectorStore>,
        catalog: Arc<dyn ContentCatalog>,
    ) -> Self {
        let config = Arc::new(config);

        let interest_service = Arc::new(InterestService::new(
            embedder.clone(),
            UserVectorRepository::new(user_index.clone()),
            catalog.clone(),
        ));

        let feed_service = Arc::new(FeedService::new(
            content_index.clone(),
            interest_service.clone(),
            catalog.clone(),
            embedder.clone(),
            config.feed.clone(),
        ));

        Self {
            config,
            embedder,
            content_index,
            user_index,
            catalog,
            interest_service,
            feed_service,
        }
    }

    /// Fully in-memory state: hashing embedder, in-memory index collections,
    /// in-memory catalog. What tests, benches, and single-process demos run
    /// against.
    pub fn in_memory(config: Config) -> Self {
        let embedder = Arc::new(HashingEmbedder::new(config.embedding.dimension));
        let content_index = Arc::new(MemoryVectorStore::new(
            config.index.content_collection.clone(),
            config.embedding.dimension,
        ));
        let user_index = Arc::new(MemoryVectorStore::new(
            config.index.user_collection.clone(),
            config.embedding.dimension,
        ));
        let catalog = Arc::new(MemoryCatalog::new());
        Self::new(config, embedder, content_index, user_index, catalog)
    }

    // --- lifecycle hooks, called explicitly by the content subsystem ---

    pub async fn on_content_created(&self, embedding: Vec<f32>, author: UserRef) -> Result<()> {
        self.interest_service
            .dispatch(ContentEvent::Created { embedding, author })
            .await
    }

    pub async fn on_content_liked(&self, embedding: Vec<f32>, liker: UserRef) -> Result<()> {
        self.interest_service
            .dispatch(ContentEvent::Liked { embedding, liker })
            .await
    }

    pub async fn on_comment_or_reply_created(
        &self,
        embedding: Vec<f32>,
        author: UserRef,
    ) -> Result<()> {
        self.interest_service
            .dispatch(ContentEvent::CommentedOrReplied { embedding, author })
            .await
    }

    // --- feed entry points ---

    pub async fn get_recommendations(
        &self,
        user: &UserRef,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<i64>> {
        self.feed_service
            .recommended_post_ids(user, page, page_size)
            .await
    }

    pub async fn semantic_search(
        &self,
        query: &str,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<i64>> {
        self.feed_service.search_post_ids(query, page, page_size).await
    }
}

pub async fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
