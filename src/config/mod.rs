use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model_name: String,
    pub dimension: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub content_collection: String,
    pub user_collection: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Initial nearest-neighbor pool size; also the per-round increment.
    pub candidate_pool_size: usize,
    /// Max expansion rounds before returning whatever novel ids exist.
    pub max_pool_rounds: usize,
    /// fetch_k multiplier when the diversity-aware query option is on.
    pub fetch_factor: usize,
    pub default_page_size: usize,
    pub use_mmr: bool,
    pub mmr_lambda: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig {
                model_name: "all-MiniLM-L6-v2".to_string(),
                dimension: 384,
            },
            index: IndexConfig {
                content_collection: "platform_content".to_string(),
                user_collection: "user_profiles".to_string(),
            },
            feed: FeedConfig {
                candidate_pool_size: 200,
                max_pool_rounds: 5,
                fetch_factor: 2,
                default_page_size: 10,
                use_mmr: false,
                mmr_lambda: 0.5,
            },
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("FEEDCORE"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
