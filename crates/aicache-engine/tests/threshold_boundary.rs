mod common;

use std::sync::Arc;

use aicache_core::ScoreOrder;
use aicache_engine::{CacheEngine, InMemoryKvStore, RequestBodyAction, SemanticSearch};
use common::{start, ScriptedVectorStore, TestEmbeddings};

async fn classify(order: ScoreOrder, threshold: f64, score: f64) -> bool {
    let store = ScriptedVectorStore::new(order, threshold).with_candidate("cached", score);
    let engine = CacheEngine::new(Arc::new(InMemoryKvStore::default())).with_semantic_search(
        SemanticSearch::new(Arc::new(TestEmbeddings::default()), Arc::new(store)),
    );
    let (_, action) = start(&engine, "q", false).await;
    matches!(action, RequestBodyAction::Respond(_))
}

#[tokio::test]
async fn lower_is_closer_accepts_at_threshold_and_rejects_beyond() {
    let threshold = 1000.0;
    assert!(classify(ScoreOrder::LowerIsCloser, threshold, threshold).await);
    assert!(classify(ScoreOrder::LowerIsCloser, threshold, 999.999).await);
    assert!(!classify(ScoreOrder::LowerIsCloser, threshold, 1000.001).await);
}

#[tokio::test]
async fn higher_is_closer_accepts_at_threshold_and_rejects_beyond() {
    let threshold = 0.9;
    assert!(classify(ScoreOrder::HigherIsCloser, threshold, threshold).await);
    assert!(classify(ScoreOrder::HigherIsCloser, threshold, 0.95).await);
    assert!(!classify(ScoreOrder::HigherIsCloser, threshold, 0.899).await);
}

#[tokio::test]
async fn same_score_classifies_differently_by_direction() {
    assert!(classify(ScoreOrder::LowerIsCloser, 2000.0, 1500.0).await);
    assert!(!classify(ScoreOrder::HigherIsCloser, 2000.0, 1500.0).await);
}

#[tokio::test]
async fn semantic_tier_serves_when_kv_is_cold() {
    use aicache_embeddings::FakeEmbeddings;
    use aicache_vectorstores::InMemoryVectorStore;

    let vectors = Arc::new(InMemoryVectorStore::new(0.999));
    let semantic = SemanticSearch::new(Arc::new(FakeEmbeddings::new(16)), vectors.clone());

    let warm = CacheEngine::new(Arc::new(InMemoryKvStore::default()))
        .with_semantic_search(semantic.clone());
    warm.store("How do I reverse a Vec?", "Call .reverse().").await;
    assert_eq!(vectors.len().await, 1);

    // Fresh key-value tier, shared vector tier.
    let cold = CacheEngine::new(Arc::new(InMemoryKvStore::default())).with_semantic_search(semantic);
    let (session, action) = start(&cold, "How do I reverse a Vec?", false).await;
    assert!(matches!(action, RequestBodyAction::Respond(_)));
    assert_eq!(session.hit().unwrap().answer(), "Call .reverse().");

    let (_, action) = start(
        &cold,
        "Completely unrelated question about cooking pasta",
        false,
    )
    .await;
    assert_eq!(action, RequestBodyAction::Resume);
}
