use feedcore::services::content::MemoryCatalog;
use feedcore::services::embedding::{EmbeddingProvider, HashingEmbedder};
use feedcore::services::vector_db::MemoryVectorStore;
use feedcore::utils::{l2_norm, mean_vector, normalize_vector_copy};
use feedcore::{AppState, Config, ContentId, UserRef};
use std::sync::Arc;

const DIM: usize = 64;

fn test_state(pool_size: usize, rounds: usize) -> (AppState, Arc<MemoryCatalog>) {
    let mut config = Config::default();
    config.embedding.dimension = DIM;
    config.feed.candidate_pool_size = pool_size;
    config.feed.max_pool_rounds = rounds;

    let catalog = Arc::new(MemoryCatalog::new());
    let state = AppState::new(
        config,
        Arc::new(HashingEmbedder::new(DIM)),
        Arc::new(MemoryVectorStore::new("content", DIM)),
        Arc::new(MemoryVectorStore::new("user_profiles", DIM)),
        catalog.clone(),
    );
    (state, catalog)
}

async fn embed(text: &str) -> Vec<f32> {
    HashingEmbedder::new(DIM).embed(text).await.unwrap()
}

/// Seeds one single-chunk post in both the catalog and the content index.
async fn seed_post(
    state: &AppState,
    catalog: &MemoryCatalog,
    id: i64,
    author: &UserRef,
    text: &str,
) {
    catalog.insert_post(id, author, format!("post {}", id));
    state
        .feed_service
        .index_chunks(ContentId::post(id), None, author, &[text.to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_interest_vector_lifecycle() {
    let (state, _catalog) = test_state(200, 5);
    let ada = UserRef::new(1, "ada");

    // no history, no tags: cannot personalize
    assert!(state
        .interest_service
        .interest_vector(&ada)
        .await
        .unwrap()
        .is_none());

    // first interaction bootstraps the vector from the event embedding
    let e1 = embed("rust borrow checker deep dive").await;
    state
        .on_content_created(e1.clone(), ada.clone())
        .await
        .unwrap();

    let after_create = state
        .interest_service
        .repository()
        .get(ada.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after_create, normalize_vector_copy(&e1));

    // a like blends in with alpha 0.10 and the result is re-normalized
    let e2 = embed("campus photography club").await;
    state.on_content_liked(e2.clone(), ada.clone()).await.unwrap();

    let expected: Vec<f32> = e2
        .iter()
        .zip(after_create.iter())
        .map(|(e, o)| 0.10 * e + 0.90 * o)
        .collect();
    let expected = normalize_vector_copy(&expected);

    let after_like = state
        .interest_service
        .repository()
        .get(ada.id)
        .await
        .unwrap()
        .unwrap();
    assert!((l2_norm(&after_like) - 1.0).abs() < 1e-5);
    for (a, b) in after_like.iter().zip(expected.iter()) {
        assert!((a - b).abs() < 1e-6);
    }
}

#[tokio::test]
async fn test_cold_start_from_declared_interests() {
    let (state, catalog) = test_state(200, 5);
    let ada = UserRef::new(1, "ada");
    catalog.set_interests(1, vec!["AI".to_string(), "Math".to_string()]);

    let vector = state
        .interest_service
        .interest_vector(&ada)
        .await
        .unwrap()
        .unwrap();
    let expected = mean_vector(&[embed("AI").await, embed("Math").await]);
    assert_eq!(vector, expected);

    // persisted: the marker document now answers subsequent reads
    assert_eq!(
        state
            .interest_service
            .repository()
            .get(1)
            .await
            .unwrap()
            .unwrap(),
        expected
    );
}

#[tokio::test]
async fn test_recommendations_exclude_seen_and_authored() {
    let (state, catalog) = test_state(200, 5);
    let ada = UserRef::new(1, "ada");
    let grace = UserRef::new(2, "grace");

    seed_post(&state, &catalog, 10, &grace, "rust async runtime internals").await;
    seed_post(&state, &catalog, 11, &grace, "rust async runtime tricks").await;
    seed_post(&state, &catalog, 12, &ada, "rust async runtime notes").await;

    // ada's vector points exactly at post 10's text
    state
        .on_content_created(embed("rust async runtime internals").await, ada.clone())
        .await
        .unwrap();

    // own post 12 is excluded without any view
    let page = state.get_recommendations(&ada, 1, 10).await.unwrap();
    assert!(page.contains(&10));
    assert!(page.contains(&11));
    assert!(!page.contains(&12));
    assert_eq!(page[0], 10);

    // once post 10 is viewed it drops out of the feed
    catalog.record_view(1, 10);
    let page = state.get_recommendations(&ada, 1, 10).await.unwrap();
    assert!(!page.contains(&10));
    assert!(page.contains(&11));
}

#[tokio::test]
async fn test_comment_chunks_recommend_their_parent_post() {
    let (state, catalog) = test_state(200, 5);
    let ada = UserRef::new(1, "ada");
    let grace = UserRef::new(2, "grace");

    catalog.insert_post(20, &grace, "quiet post");
    // the post body is off-topic for ada; only the comment matches her vector
    state
        .feed_service
        .index_chunks(
            ContentId::post(20),
            None,
            &grace,
            &["gardening on a budget".to_string()],
        )
        .await
        .unwrap();
    state
        .feed_service
        .index_chunks(
            ContentId::comment(7),
            Some(20),
            &grace,
            &["actually this reads like linear algebra".to_string()],
        )
        .await
        .unwrap();

    state
        .on_content_created(embed("actually this reads like linear algebra").await, ada.clone())
        .await
        .unwrap();

    let page = state.get_recommendations(&ada, 1, 10).await.unwrap();
    assert_eq!(page[0], 20);
    // the comment resolves to its parent post, never to itself
    assert_eq!(page.iter().filter(|&&id| id == 20).count(), 1);
}

#[tokio::test]
async fn test_pool_expansion_with_heavy_exclusions() {
    // pool of 2 per round, up to 5 rounds
    let (state, catalog) = test_state(2, 5);
    let ada = UserRef::new(1, "ada");
    let grace = UserRef::new(2, "grace");

    for id in 1..=8 {
        seed_post(&state, &catalog, id, &grace, &format!("topic number {}", id)).await;
        // ada saw everything except posts 7 and 8
        if id <= 6 {
            catalog.record_view(1, id);
        }
    }

    state
        .on_content_created(embed("topic number one").await, ada.clone())
        .await
        .unwrap();

    // the first rounds are swamped by viewed posts; expansion must still
    // surface the two unseen ones and then stop
    let page = state.get_recommendations(&ada, 1, 10).await.unwrap();
    let mut found = page.clone();
    found.sort();
    assert_eq!(found, vec![7, 8]);
}

#[tokio::test]
async fn test_feed_is_deduplicated_across_chunks() {
    let (state, catalog) = test_state(200, 5);
    let ada = UserRef::new(1, "ada");
    let grace = UserRef::new(2, "grace");

    catalog.insert_post(30, &grace, "long post");
    state
        .feed_service
        .index_chunks(
            ContentId::post(30),
            None,
            &grace,
            &[
                "distributed systems part one".to_string(),
                "distributed systems part two".to_string(),
                "distributed systems part three".to_string(),
            ],
        )
        .await
        .unwrap();

    state
        .on_content_created(embed("distributed systems part one").await, ada.clone())
        .await
        .unwrap();

    let page = state.get_recommendations(&ada, 1, 10).await.unwrap();
    assert_eq!(page, vec![30]);
}

#[tokio::test]
async fn test_semantic_search_and_pagination() {
    let (state, catalog) = test_state(200, 5);
    let grace = UserRef::new(2, "grace");

    seed_post(&state, &catalog, 1, &grace, "scholarship deadline reminder").await;
    seed_post(&state, &catalog, 2, &grace, "intramural soccer signups").await;
    seed_post(&state, &catalog, 3, &grace, "library quiet hours").await;

    // exact text match ranks first; no exclusions apply to search
    let results = state
        .semantic_search("scholarship deadline reminder", 1, 10)
        .await
        .unwrap();
    assert_eq!(results[0], 1);
    assert_eq!(results.len(), 3);

    // pages partition the same ordered list
    let page1 = state
        .semantic_search("scholarship deadline reminder", 1, 2)
        .await
        .unwrap();
    let page2 = state
        .semantic_search("scholarship deadline reminder", 2, 2)
        .await
        .unwrap();
    assert_eq!(page1.len(), 2);
    assert_eq!(page2.len(), 1);
    assert!(page1.iter().all(|id| !page2.contains(id)));

    let page3 = state
        .semantic_search("scholarship deadline reminder", 3, 2)
        .await
        .unwrap();
    assert!(page3.is_empty());
}

#[tokio::test]
async fn test_unpersonalizable_user_gets_empty_feed() {
    let (state, catalog) = test_state(200, 5);
    let grace = UserRef::new(2, "grace");
    seed_post(&state, &catalog, 1, &grace, "anything at all").await;

    // no vector, no tags: empty page, not an error
    let stranger = UserRef::new(99, "stranger");
    let page = state.get_recommendations(&stranger, 1, 10).await.unwrap();
    assert!(page.is_empty());
}

#[tokio::test]
async fn test_invalid_page_params_are_errors() {
    let (state, _catalog) = test_state(200, 5);
    let ada = UserRef::new(1, "ada");

    assert!(state.get_recommendations(&ada, 0, 10).await.is_err());
    assert!(state.get_recommendations(&ada, 1, 0).await.is_err());
    assert!(state.semantic_search("query", 0, 10).await.is_err());
}

#[tokio::test]
async fn test_content_removal_drops_it_from_search() {
    let (state, catalog) = test_state(200, 5);
    let grace = UserRef::new(2, "grace");

    seed_post(&state, &catalog, 1, &grace, "ephemeral announcement").await;
    let results = state.semantic_search("ephemeral announcement", 1, 10).await.unwrap();
    assert_eq!(results, vec![1]);

    state
        .feed_service
        .remove_content(ContentId::post(1))
        .await
        .unwrap();
    let results = state.semantic_search("ephemeral announcement", 1, 10).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_similar_users() {
    let (state, _catalog) = test_state(200, 5);
    let ada = UserRef::new(1, "ada");
    let grace = UserRef::new(2, "grace");
    let noor = UserRef::new(3, "noor");

    let shared = embed("graph theory puzzles").await;
    state.on_content_created(shared.clone(), ada.clone()).await.unwrap();
    state.on_content_created(shared, grace.clone()).await.unwrap();
    state
        .on_content_created(embed("sourdough starters").await, noor.clone())
        .await
        .unwrap();

    let peers = state.interest_service.similar_users(&ada, 1).await.unwrap();
    assert_eq!(peers, vec![grace]);

    // a user with no vector has no peers
    let stranger = UserRef::new(9, "stranger");
    assert!(state
        .interest_service
        .similar_users(&stranger, 3)
        .await
        .unwrap()
        .is_empty());
}
