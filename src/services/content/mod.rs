use crate::models::{ContentRecord, UserRef};
use anyhow::Result;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};

/// Read-side view of the content system of record. The feed computes its
/// exclusion set fresh from here on every request; nothing is cached in the
/// core.
#[async_trait::async_trait]
pub trait ContentCatalog: Send + Sync {
    async fn viewed_post_ids(&self, user_id: i64) -> Result<HashSet<i64>>;
    async fn authored_post_ids(&self, user_id: i64) -> Result<HashSet<i64>>;
    async fn declared_interests(&self, user_id: i64) -> Result<Vec<String>>;
    /// Full records for `ids`, in exactly the order of `ids`. Storage order
    /// is not relevance order, so implementations must sort by the position
    /// of each id in the request.
    async fn posts_by_ids(&self, ids: &[i64]) -> Result<Vec<ContentRecord>>;
}

/// In-memory catalog for tests, benches, and single-process deployments.
#[derive(Default)]
pub struct MemoryCatalog {
    posts: DashMap<i64, (i64, ContentRecord)>,
    views: DashMap<i64, HashSet<i64>>,
    interests: DashMap<i64, Vec<String>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_post(&self, id: i64, author: &UserRef, title: impl Into<String>) {
        let record = ContentRecord {
            id,
            title: title.into(),
            author_username: author.username.clone(),
            created_at: Utc::now(),
        };
        self.posts.insert(id, (author.id, record));
    }

    pub fn record_view(&self, user_id: i64, post_id: i64) {
        self.views.entry(user_id).or_default().insert(post_id);
    }

    pub fn set_interests(&self, user_id: i64, tags: Vec<String>) {
        self.interests.insert(user_id, tags);
    }
}

#[async_trait::async_trait]
impl ContentCatalog for MemoryCatalog {
    async fn viewed_post_ids(&self, user_id: i64) -> Result<HashSet<i64>> {
        Ok(self
            .views
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn authored_post_ids(&self, user_id: i64) -> Result<HashSet<i64>> {
        Ok(self
            .posts
            .iter()
            .filter(|entry| entry.value().0 == user_id)
            .map(|entry| *entry.key())
            .collect())
    }

    async fn declared_interests(&self, user_id: i64) -> Result<Vec<String>> {
        Ok(self
            .interests
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn posts_by_ids(&self, ids: &[i64]) -> Result<Vec<ContentRecord>> {
        // Collect first, emit by request position: storage iteration order
        // must not leak into the result.
        let found: HashMap<i64, ContentRecord> = ids
            .iter()
            .filter_map(|id| {
                self.posts
                    .get(id)
                    .map(|entry| (*id, entry.value().1.clone()))
            })
            .collect();

        Ok(ids.iter().filter_map(|id| found.get(id).cloned()).collect())
    }
}
