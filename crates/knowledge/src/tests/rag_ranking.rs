//! Ranking, merge and failure semantics of the query engine.

use super::support::{fixed_engine, FixedEmbedder, RecordingStore, ScriptedReranker};
use crate::metadata::Metadata;
use crate::rag::{QueryEngine, SearchHit};
use crate::rerank::Reranker;
use crate::store::{VectorStore, DEFAULT_STORE_TIMEOUT};
use crate::types::VectorItem;
use docindex_core::AppError;
use std::sync::Arc;
use std::time::Duration;

fn item(id: &str, vector: Vec<f32>) -> VectorItem {
    VectorItem {
        id: id.to_string(),
        text: id.to_string(),
        vector,
        metadata: Metadata::new(),
    }
}

fn ids(hits: &[SearchHit]) -> Vec<&str> {
    hits.iter().map(|h| h.id.as_str()).collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn query_embedder() -> FixedEmbedder {
    FixedEmbedder::new(
        2,
        &[
            ("q", vec![1.0, 0.0]),
            ("q2", vec![1.0, 0.0]),
            ("bad", vec![1.0, 0.0]),
        ],
    )
}

async fn seeded(store: &RecordingStore, collection: &str, items: Vec<VectorItem>) {
    store.insert(collection, &items).await.unwrap();
}

fn engine(store: Arc<RecordingStore>, reranker: Option<Arc<dyn Reranker>>) -> QueryEngine {
    QueryEngine::new(store, fixed_engine(query_embedder()), reranker)
}

#[tokio::test]
async fn test_closer_item_ranks_first() {
    for order in [["near", "far"], ["far", "near"]] {
        let store = Arc::new(RecordingStore::new());
        let items = order
            .iter()
            .map(|id| match *id {
                "near" => item("near", vec![1.0, 0.0]),
                _ => item("far", vec![0.0, 1.0]),
            })
            .collect();
        seeded(&store, "c", items).await;

        let report = engine(store, None)
            .query_collection(&strings(&["c"]), &strings(&["q"]), 2, None, None)
            .await
            .unwrap();

        assert_eq!(ids(&report.hits), vec!["near", "far"]);
        assert!((report.hits[0].score - 1.0).abs() < 1e-6);
        assert!(report.hits[1].score.abs() < 1e-6);
    }
}

#[tokio::test]
async fn test_equal_scores_keep_retrieval_order() {
    let store = Arc::new(RecordingStore::new());
    seeded(
        &store,
        "c",
        vec![item("a", vec![1.0, 1.0]), item("b", vec![2.0, 2.0])],
    )
    .await;

    let report = engine(store, None)
        .query_collection(&strings(&["c"]), &strings(&["q"]), 5, None, None)
        .await
        .unwrap();
    assert_eq!(ids(&report.hits), vec!["a", "b"]);
}

#[tokio::test]
async fn test_cross_collection_ties_follow_collection_order() {
    let store = Arc::new(RecordingStore::new());
    seeded(&store, "c1", vec![item("x", vec![1.0, 0.0])]).await;
    seeded(&store, "c2", vec![item("y", vec![1.0, 0.0])]).await;
    let engine = engine(store, None);

    let forward = engine
        .query_collection(&strings(&["c1", "c2"]), &strings(&["q"]), 5, None, None)
        .await
        .unwrap();
    let backward = engine
        .query_collection(&strings(&["c2", "c1"]), &strings(&["q"]), 5, None, None)
        .await
        .unwrap();

    assert_eq!(ids(&forward.hits), vec!["x", "y"]);
    assert_eq!(ids(&backward.hits), vec!["y", "x"]);
    assert_eq!(backward.hits[0].collection, "c2");
}

#[tokio::test]
async fn test_multi_query_hits_deduplicated() {
    let store = Arc::new(RecordingStore::new());
    seeded(
        &store,
        "c",
        vec![item("a", vec![1.0, 0.0]), item("b", vec![0.5, 0.5])],
    )
    .await;

    let report = engine(store, None)
        .query_collection(&strings(&["c"]), &strings(&["q", "q2"]), 10, None, None)
        .await
        .unwrap();
    assert_eq!(ids(&report.hits), vec!["a", "b"]);
}

#[tokio::test]
async fn test_hybrid_reranks_thresholds_and_truncates() {
    let store = Arc::new(RecordingStore::new());
    seeded(
        &store,
        "c",
        vec![
            item("a", vec![1.0, 0.0]),
            item("b", vec![0.9, 0.1]),
            item("c", vec![0.5, 0.5]),
        ],
    )
    .await;
    let reranker = Arc::new(ScriptedReranker::new(&[("a", 0.1), ("b", 0.9), ("c", 0.5)]));
    let engine = engine(store, Some(reranker.clone()));

    let top = engine
        .query_collection_with_hybrid_search(&strings(&["c"]), &strings(&["q"]), 1, 3, 0.3, None, None)
        .await
        .unwrap();
    assert_eq!(ids(&top.hits), vec!["b"]);
    assert_eq!(top.hits[0].score, 0.9);
    assert_eq!(reranker.seen.lock().unwrap()[0], ("q".to_string(), 3));

    let all = engine
        .query_collection_with_hybrid_search(&strings(&["c"]), &strings(&["q"]), 3, 1, 0.3, None, None)
        .await
        .unwrap();
    assert_eq!(ids(&all.hits), vec!["b", "c"]);
}

#[tokio::test]
async fn test_hybrid_requires_reranker() {
    let store = Arc::new(RecordingStore::new());
    let result = engine(store, None)
        .query_collection_with_hybrid_search(&strings(&["c"]), &strings(&["q"]), 3, 3, 0.0, None, None)
        .await;
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[tokio::test]
async fn test_failed_query_reported_not_silently_empty() {
    let store = Arc::new(RecordingStore::new());
    seeded(&store, "c", vec![item("a", vec![1.0, 0.0])]).await;
    let engine = QueryEngine::new(
        store,
        fixed_engine(query_embedder().failing_on("bad")),
        None,
    );

    let report = engine
        .query_collection(&strings(&["c"]), &strings(&["q", "bad"]), 3, None, None)
        .await
        .unwrap();
    assert_eq!(ids(&report.hits), vec!["a"]);
    assert!(report.is_partial());
    assert_eq!(report.failures[0].query, "bad");
    assert!(report.failures[0].collection.is_none());

    let all_failed = engine
        .query_collection(&strings(&["c"]), &strings(&["bad"]), 3, None, None)
        .await;
    assert!(matches!(all_failed, Err(AppError::Embedding(_))));
}

#[tokio::test]
async fn test_failing_collection_recorded() {
    let store = Arc::new(RecordingStore::new().failing_search_in("c2"));
    seeded(&store, "c1", vec![item("a", vec![1.0, 0.0])]).await;

    let report = engine(store, None)
        .query_collection(&strings(&["c1", "c2"]), &strings(&["q"]), 3, None, None)
        .await
        .unwrap();

    assert_eq!(ids(&report.hits), vec!["a"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].collection.as_deref(), Some("c2"));
    assert!(matches!(report.failures[0].error, AppError::VectorStore(_)));
}

#[tokio::test]
async fn test_no_matches_is_not_a_failure() {
    let store = Arc::new(RecordingStore::new());
    let report = engine(store, None)
        .query_collection(&strings(&["empty"]), &strings(&["q"]), 3, None, None)
        .await
        .unwrap();
    assert!(report.hits.is_empty());
    assert!(!report.is_partial());
    assert_eq!(report.grouped().ids, vec![Vec::<String>::new()]);
}

#[tokio::test(start_paused = true)]
async fn test_hung_collection_times_out_per_pair() {
    let store = Arc::new(RecordingStore::new().hanging_search_in("slow"));
    seeded(&store, "fast", vec![item("a", vec![1.0, 0.0])]).await;
    let engine = engine(store, None).with_store_timeout(Duration::from_secs(5));

    let report = engine
        .query_collection(&strings(&["fast", "slow"]), &strings(&["q"]), 3, None, None)
        .await
        .unwrap();

    assert_eq!(ids(&report.hits), vec!["a"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].collection.as_deref(), Some("slow"));
    assert!(matches!(report.failures[0].error, AppError::Timeout { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_every_search_hung_returns_timeout() {
    let store = Arc::new(RecordingStore::new().hanging_search_in("c"));

    let result = engine(store, None)
        .query_collection(&strings(&["c"]), &strings(&["q"]), 3, None, None)
        .await;
    assert!(matches!(
        result,
        Err(AppError::Timeout { after, .. }) if after == DEFAULT_STORE_TIMEOUT
    ));
}

#[tokio::test]
async fn test_nan_rerank_score_is_dropped() {
    let store = Arc::new(RecordingStore::new());
    seeded(
        &store,
        "c",
        vec![item("a", vec![1.0, 0.0]), item("b", vec![0.9, 0.1])],
    )
    .await;
    let reranker = Arc::new(ScriptedReranker::new(&[("a", f32::NAN), ("b", 0.4)]));

    let report = engine(store, Some(reranker))
        .query_collection_with_hybrid_search(&strings(&["c"]), &strings(&["q"]), 2, 2, 0.0, None, None)
        .await
        .unwrap();
    assert_eq!(ids(&report.hits), vec!["b"]);
}
