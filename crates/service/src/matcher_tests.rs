use chrono::{TimeZone, Utc};
use smart_query_storage::MemoryStore;

use super::*;
use crate::test_support::{make_query, reporting_catalog, reporting_embedder, ScriptedLlm, StaticEmbedder};

fn hit(query_id: &str, example: &str, distance: f32) -> ExampleMatch {
    ExampleMatch {
        example_id: format!("{query_id}#{example}"),
        verified_query_id: query_id.to_owned(),
        question_text: example.to_owned(),
        distance,
    }
}

fn matcher(llm: Arc<ScriptedLlm>, store: MemoryStore, embedder: StaticEmbedder) -> VerifiedQueryMatcher {
    let store = Arc::new(store);
    VerifiedQueryMatcher::new(llm, Arc::new(embedder), store.clone(), store, 5, 2.0)
}

#[test]
fn nearest_per_query_keeps_minimum_distance() {
    let hits = vec![hit("q1", "a", 0.4), hit("q2", "b", 0.2), hit("q1", "c", 0.1), hit("q3", "d", 1.9)];
    let nearest = nearest_per_query(hits, 1.5);
    let ids: Vec<_> = nearest.iter().map(|m| (m.verified_query_id.as_str(), m.distance)).collect();
    assert_eq!(ids, [("q1", 0.1), ("q2", 0.2)]);
    assert_eq!(nearest[0].question_text, "c");
}

#[tokio::test]
async fn candidates_are_ordered_with_newest_first_on_ties() {
    let mut older = make_query("old", "Older", "SELECT 1", &[("total premiums", [1.0, 0.0, 0.0])], &[]);
    older.verified_at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let mut newer = make_query("new", "Newer", "SELECT 2", &[("premium total", [1.0, 0.0, 0.0])], &[]);
    newer.verified_at = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let far = make_query("far", "Far", "SELECT 3", &[("claims", [0.0, 1.0, 0.0])], &[]);
    let store = MemoryStore::from_queries([older, far, newer]);
    let embedder = StaticEmbedder::new(&[("premiums", [1.0, 0.0, 0.0])]);

    let m = matcher(Arc::new(ScriptedLlm::new()), store, embedder);
    let candidates = m.candidates("premiums").await.unwrap();
    let ids: Vec<_> = candidates.iter().map(|c| c.query.id.as_str()).collect();
    assert_eq!(ids, ["new", "old", "far"]);
    assert!(candidates.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[tokio::test]
async fn empty_library_is_no_match_without_llm_call() {
    let llm = Arc::new(ScriptedLlm::new());
    let m = matcher(llm.clone(), MemoryStore::new(), reporting_embedder());
    let outcome = m.find("show total premiums last month").await.unwrap();
    assert!(matches!(outcome, MatchOutcome::NoMatch { .. }));
    assert_eq!(llm.calls(PromptKind::SelectMatch), 0);
}

#[tokio::test]
async fn llm_can_decline_every_candidate() {
    let llm = Arc::new(ScriptedLlm::new());
    llm.reply(PromptKind::SelectMatch, r#"{"query_id": null, "reasoning": "asks about weather"}"#);
    let m = matcher(llm, reporting_catalog(), reporting_embedder());
    let outcome = m.find("will it rain").await.unwrap();
    let MatchOutcome::NoMatch { reasoning } = outcome else {
        panic!("expected no match");
    };
    assert_eq!(reasoning, "asks about weather");
}

#[tokio::test]
async fn selection_by_id_and_by_index() {
    let llm = Arc::new(ScriptedLlm::new());
    llm.reply(PromptKind::SelectMatch, r#"{"query_id": "q2", "confidence": 0.7, "reasoning": "regional"}"#);
    llm.reply(PromptKind::SelectMatch, r#"{"best_match_index": 1, "confidence": 0.9}"#);
    let m = matcher(llm.clone(), reporting_catalog(), reporting_embedder());

    let MatchOutcome::Matched(by_id) = m.find("show total premiums last month").await.unwrap() else {
        panic!("expected a match");
    };
    assert_eq!(by_id.query.id, "q2");
    assert_eq!(by_id.matched_question, "claims by region");

    let MatchOutcome::Matched(by_index) = m.find("show total premiums last month").await.unwrap() else {
        panic!("expected a match");
    };
    assert_eq!(by_index.query.id, "q1");
    assert!(by_index.distance.abs() < 1e-6);
    assert!(llm.prompts(PromptKind::SelectMatch)[0].user.contains("Id: q1"));
}

#[tokio::test]
async fn unknown_selection_is_malformed() {
    let llm = Arc::new(ScriptedLlm::new());
    llm.reply(PromptKind::SelectMatch, r#"{"query_id": "q42", "confidence": 0.9}"#);
    let m = matcher(llm, reporting_catalog(), reporting_embedder());
    let err = m.find("claims by region").await.unwrap_err();
    assert!(matches!(err, ServiceError::Llm(ref e) if e.is_malformed()));
}

#[tokio::test]
async fn max_distance_filters_candidates() {
    let store = Arc::new(reporting_catalog());
    let llm = Arc::new(ScriptedLlm::new());
    let m = VerifiedQueryMatcher::new(llm, Arc::new(reporting_embedder()), store.clone(), store, 5, 0.5);
    let candidates = m.candidates("claims by region").await.unwrap();
    let ids: Vec<_> = candidates.iter().map(|c| c.query.id.as_str()).collect();
    assert_eq!(ids, ["q2", "q4"]);
}
