use crate::models::{ContentEvent, InteractionEvent, UserRef, UserVectorMetadata};
use crate::services::content::ContentCatalog;
use crate::services::embedding::EmbeddingProvider;
use crate::services::vector_db::{QueryOptions, VectorStore};
use crate::utils::{l2_norm, mean_vector, normalize_vector, validation};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Persistence facade for per-user interest vectors, scoped to the user
/// collection. Each vector is stored as a zero-content marker document whose
/// embedding payload is the interest vector itself.
pub struct UserVectorRepository {
    store: Arc<dyn VectorStore>,
}

impl UserVectorRepository {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    fn user_key(user_id: i64) -> String {
        format!("user_{}", user_id)
    }

    pub async fn get(&self, user_id: i64) -> Result<Option<Vec<f32>>> {
        let doc = self.store.get(&Self::user_key(user_id)).await?;
        // an all-zeros payload carries no signal and counts as absent
        Ok(doc
            .map(|d| d.embedding)
            .filter(|embedding| l2_norm(embedding) > 0.0))
    }

    pub async fn set(&self, user: &UserRef, embedding: Vec<f32>) -> Result<()> {
        let metadata = UserVectorMetadata {
            user_id: user.id,
            username: user.username.clone(),
            updated_at: Utc::now(),
        };
        self.store
            .upsert(
                &Self::user_key(user.id),
                embedding,
                serde_json::to_value(&metadata)?,
            )
            .await
    }

    pub async fn query_similar(&self, embedding: &[f32], k: usize) -> Result<Vec<UserVectorMetadata>> {
        let results = self
            .store
            .query(embedding, k, QueryOptions::default())
            .await?;

        let mut users = Vec::new();
        for doc in results {
            match serde_json::from_value::<UserVectorMetadata>(doc.metadata) {
                Ok(meta) => users.push(meta),
                Err(e) => {
                    warn!("Skipping user document `{}` with malformed metadata: {}", doc.id, e);
                }
            }
        }
        Ok(users)
    }
}

/// Maintains per-user interest vectors: tag-based cold start for new users,
/// EWMA updates for every qualifying interaction afterwards. Updates are an
/// O(1) blend of the incoming embedding with the stored vector; there is no
/// batch recomputation over interaction history.
pub struct InterestService {
    embedder: Arc<dyn EmbeddingProvider>,
    repository: UserVectorRepository,
    catalog: Arc<dyn ContentCatalog>,
}

impl InterestService {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        repository: UserVectorRepository,
        catalog: Arc<dyn ContentCatalog>,
    ) -> Self {
        Self {
            embedder,
            repository,
            catalog,
        }
    }

    pub fn repository(&self) -> &UserVectorRepository {
        &self.repository
    }

    /// The user's interest vector, cold-starting from declared interest tags
    /// when no stored vector exists. `None` means the user cannot be
    /// personalized right now; callers treat that as an empty feed, not an
    /// error. A failing index read degrades to `None` as well.
    pub async fn interest_vector(&self, user: &UserRef) -> Result<Option<Vec<f32>>> {
        match self.repository.get(user.id).await {
            Ok(Some(vector)) => Ok(Some(vector)),
            Ok(None) => self.cold_start_vector(user).await,
            Err(e) => {
                error!(
                    "Failed to read interest vector for user {}: {}",
                    user.username, e
                );
                Ok(None)
            }
        }
    }

    /// Initial vector for a user with no stored profile: the mean of their
    /// declared interest tag embeddings, persisted on success.
    async fn cold_start_vector(&self, user: &UserRef) -> Result<Option<Vec<f32>>> {
        let tags = self.catalog.declared_interests(user.id).await?;
        if tags.is_empty() {
            info!(
                "No stored vector and no declared interests for user {}; cannot personalize",
                user.username
            );
            return Ok(None);
        }

        let mut tag_embeddings = Vec::new();
        for tag in &tags {
            match self.embedder.embed(tag).await {
                Ok(embedding) => tag_embeddings.push(embedding),
                Err(e) => warn!("Failed to embed interest tag `{}`: {}", tag, e),
            }
        }

        if tag_embeddings.is_empty() {
            warn!(
                "Could not embed any of {} declared interests for user {}",
                tags.len(),
                user.username
            );
            return Ok(None);
        }

        let initial = mean_vector(&tag_embeddings);
        if let Err(e) = self.repository.set(user, initial.clone()).await {
            warn!(
                "Failed to persist initial interest vector for user {}: {}",
                user.username, e
            );
        } else {
            info!(
                "Cold-started interest vector for user {} from {} interest tags",
                user.username,
                tag_embeddings.len()
            );
        }

        Ok(Some(initial))
    }

    /// Applies one interaction to the user's vector:
    /// `new = alpha * event + (1 - alpha) * old`, L2-normalized. A user with
    /// no prior vector bootstraps from the interaction embedding itself.
    pub async fn apply_interaction(&self, user: &UserRef, event: InteractionEvent) -> Result<()> {
        validation::validate_embedding(&event.embedding)?;

        let alpha = event.kind.alpha();
        let old = match self.repository.get(user.id).await {
            Ok(Some(vector)) => Some(vector),
            Ok(None) => self.cold_start_vector(user).await?,
            Err(e) => {
                // a blind overwrite could clobber a real profile; drop the
                // event instead and let later ones correct the average
                warn!(
                    "Dropping {} interaction for user {}: interest vector read failed: {}",
                    event.kind.as_str(),
                    user.username,
                    e
                );
                return Ok(());
            }
        };

        let mut next = match old {
            Some(old) if old.len() == event.embedding.len() => event
                .embedding
                .iter()
                .zip(old.iter())
                .map(|(e, o)| alpha * e + (1.0 - alpha) * o)
                .collect(),
            Some(old) => {
                // stale vector from a previous embedding model; start over
                warn!(
                    "Stored vector for user {} has dimension {}, event has {}; re-bootstrapping",
                    user.username,
                    old.len(),
                    event.embedding.len()
                );
                event.embedding.clone()
            }
            None => {
                info!(
                    "User {} has no prior vector; bootstrapping from {} event",
                    user.username,
                    event.kind.as_str()
                );
                event.embedding.clone()
            }
        };

        if l2_norm(&next) == 0.0 {
            // a zero blend carries no signal; keep the event's direction instead
            warn!(
                "EWMA update for user {} collapsed to zero norm; falling back to event embedding",
                user.username
            );
            next = event.embedding.clone();
        }
        normalize_vector(&mut next);

        match self.repository.set(user, next).await {
            Ok(()) => {
                info!(
                    "Updated interest vector for user {} via {}",
                    user.username,
                    event.kind.as_str()
                );
            }
            Err(e) => {
                // lost updates are acceptable; the EWMA self-corrects on later events
                error!(
                    "Dropping interest update for user {} ({}): {}",
                    user.username,
                    event.kind.as_str(),
                    e
                );
            }
        }

        Ok(())
    }

    /// Entry point for content lifecycle events. The content subsystem calls
    /// this explicitly after create/like/comment instead of the core hooking
    /// into its save path.
    pub async fn dispatch(&self, event: ContentEvent) -> Result<()> {
        let (user, interaction) = event.into_interaction();
        self.apply_interaction(&user, interaction).await
    }

    /// The `k` users whose interest vectors sit closest to this user's own.
    pub async fn similar_users(&self, user: &UserRef, k: usize) -> Result<Vec<UserRef>> {
        let Some(vector) = self.repository.get(user.id).await? else {
            warn!(
                "No interest vector for user {}; cannot find similar users",
                user.username
            );
            return Ok(Vec::new());
        };

        // k + 1 so the caller's own marker can be dropped
        let neighbors = match self.repository.query_similar(&vector, k + 1).await {
            Ok(neighbors) => neighbors,
            Err(e) => {
                error!("Similarity search failed for user {}: {}", user.username, e);
                return Ok(Vec::new());
            }
        };

        Ok(neighbors
            .into_iter()
            .filter(|meta| meta.user_id != user.id)
            .take(k)
            .map(|meta| UserRef::new(meta.user_id, meta.username))
            .collect())
    }
}
