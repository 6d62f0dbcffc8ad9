use std::sync::Arc;

use chrono::{TimeZone, Utc};

use super::make_query;
use crate::error::StorageError;
use crate::memory::MemoryStore;
use crate::traits::{VectorSearch, VerifiedQueryStore};

fn library() -> MemoryStore {
    MemoryStore::from_queries([
        make_query("q1", &[("total premiums", vec![1.0, 0.0]), ("premium sum", vec![0.8, 0.2])], &[
            "q2",
        ]),
        make_query("q2", &[("claims by region", vec![0.0, 1.0])], &[]),
    ])
}

#[tokio::test]
async fn test_get_and_not_found() {
    let store = library();
    let vq = store.get("q1").await.unwrap();
    assert_eq!(vq.follow_ups, vec!["q2"]);

    let err = store.get("missing").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { entity: "verified_query", ref id } if id == "missing"));
}

#[tokio::test]
async fn test_all_examples_in_insertion_order() {
    let store = library();
    let examples = store.all_examples().await.unwrap();
    let texts: Vec<_> = examples.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, vec!["total premiums", "premium sum", "claims by region"]);
    assert_eq!(examples[0].verified_query_id, "q1");
    assert_ne!(examples[0].example_id, examples[1].example_id);
}

#[tokio::test]
async fn test_search_orders_by_distance_and_limits() {
    let store = library();
    let matches = store.search(&[1.0, 0.0], 2).await.unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].question_text, "total premiums");
    assert_eq!(matches[1].question_text, "premium sum");
    assert!(matches[0].distance <= matches[1].distance);

    assert!(store.search(&[1.0, 0.0], 0).await.unwrap().is_empty());
    assert!(store.search(&[], 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_cut_keeps_newest_on_equal_distance() {
    let mut old = make_query("old", &[("total premiums", vec![1.0, 0.0])], &[]);
    old.verified_at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let mut new = make_query("new", &[("total premiums", vec![1.0, 0.0])], &[]);
    new.verified_at = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let store = MemoryStore::from_queries([old, new]);

    let matches = store.search(&[1.0, 0.0], 1).await.unwrap();
    let ids: Vec<_> = matches.iter().map(|m| m.verified_query_id.as_str()).collect();
    assert_eq!(ids, ["new"]);
}

#[tokio::test]
async fn test_search_skips_unembedded_and_mismatched_examples() {
    let mut vq = make_query("q3", &[("three dims", vec![1.0, 0.0, 0.0])], &[]);
    vq.questions.push(smart_query_core::ExampleQuestion::new("no embedding yet"));
    let store = MemoryStore::from_queries([vq]);

    let matches = store.search(&[1.0, 0.0], 5).await.unwrap();
    assert!(matches.is_empty());
}

#[tokio::test]
async fn test_upsert_replaces_without_duplicating_order() {
    let store = library();
    store.upsert(make_query("q1", &[("renamed example", vec![1.0, 0.0])], &[]));
    assert_eq!(store.len(), 2);

    let examples = store.all_examples().await.unwrap();
    assert_eq!(examples[0].text, "renamed example");
    assert_eq!(examples.len(), 2);

    assert!(store.remove("q2"));
    assert!(!store.remove("q2"));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_readers_never_observe_torn_records() {
    let store = Arc::new(library());
    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for i in 0..200 {
                let text = format!("version {i}");
                store.upsert(make_query("q1", &[(text.as_str(), vec![1.0, 0.0]), (text.as_str(), vec![0.9, 0.1])], &[]));
            }
        })
    };

    for _ in 0..200 {
        let vq = store.get("q1").await.unwrap();
        if vq.questions.len() == 2 {
            assert_eq!(vq.questions[0].text, vq.questions[1].text, "both examples come from one write");
        }
        tokio::task::yield_now().await;
    }
    writer.await.unwrap();
}
