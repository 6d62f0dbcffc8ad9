//! Verified query matching: vector candidates, then one LLM selection.

use std::collections::HashMap;
use std::sync::Arc;

use smart_query_core::{ExampleMatch, VerifiedQuery};
use smart_query_embeddings::EmbeddingProvider;
use smart_query_llm::{
    parse_selection, selection_prompt, CompletionProvider, LlmError, PromptKind, SelectionCandidate,
    SelectionJson,
};
use smart_query_storage::{VectorSearch, VerifiedQueryStore};

use crate::ServiceError;

const NO_CANDIDATES: &str = "No verified query is similar enough to the question";

/// A verified query reachable from the question, with its closest example.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub query: Arc<VerifiedQuery>,
    pub matched_question: String,
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct MatchedQuery {
    pub query: Arc<VerifiedQuery>,
    pub matched_question: String,
    pub distance: f32,
    pub confidence: f32,
    pub reasoning: String,
}

#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Matched(MatchedQuery),
    /// Not an error: nothing in the library answers the question.
    NoMatch { reasoning: String },
}

pub struct VerifiedQueryMatcher {
    llm: Arc<dyn CompletionProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VerifiedQueryStore>,
    search: Arc<dyn VectorSearch>,
    top_k: usize,
    max_distance: f32,
}

impl VerifiedQueryMatcher {
    #[must_use]
    pub fn new(
        llm: Arc<dyn CompletionProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VerifiedQueryStore>,
        search: Arc<dyn VectorSearch>,
        top_k: usize,
        max_distance: f32,
    ) -> Self {
        Self { llm, embedder, store, search, top_k, max_distance }
    }

    pub async fn find(&self, question: &str) -> Result<MatchOutcome, ServiceError> {
        let candidates = self.candidates(question).await?;
        self.select(question, &candidates).await
    }

    /// Deduplicated candidates ordered by distance, newest `verified_at` first on ties.
    pub async fn candidates(&self, question: &str) -> Result<Vec<Candidate>, ServiceError> {
        let embedder = Arc::clone(&self.embedder);
        let text = question.to_owned();
        let embedding = tokio::task::spawn_blocking(move || embedder.embed(&text)).await??;

        let hits = self.search.search(&embedding, self.top_k).await?;
        let nearest = nearest_per_query(hits, self.max_distance);

        let mut candidates = Vec::with_capacity(nearest.len());
        for hit in nearest {
            match self.store.get(&hit.verified_query_id).await {
                Ok(query) => candidates.push(Candidate {
                    query: Arc::new(query),
                    matched_question: hit.question_text,
                    distance: hit.distance,
                }),
                Err(e) if e.is_not_found() => {
                    tracing::warn!(
                        query_id = %hit.verified_query_id,
                        "vector index references a missing verified query, skipping"
                    );
                },
                Err(e) => return Err(e.into()),
            }
        }
        rank_candidates(&mut candidates);
        tracing::debug!(count = candidates.len(), "verified query candidates");
        Ok(candidates)
    }

    /// Let the model pick one candidate or none. Zero candidates never reach the model.
    pub async fn select(
        &self,
        question: &str,
        candidates: &[Candidate],
    ) -> Result<MatchOutcome, ServiceError> {
        if candidates.is_empty() {
            return Ok(MatchOutcome::NoMatch { reasoning: NO_CANDIDATES.to_owned() });
        }
        let shown: Vec<SelectionCandidate<'_>> = candidates
            .iter()
            .map(|c| SelectionCandidate {
                query: &c.query,
                matched_question: &c.matched_question,
                distance: c.distance,
            })
            .collect();
        let prompt = selection_prompt(question, &shown);
        let content = self.llm.complete(&prompt).await?;
        let selection = parse_selection(&content)?;
        resolve_selection(selection, candidates, &content)
    }
}

/// Keeps each verified query's closest example within `max_distance`.
pub(crate) fn nearest_per_query(hits: Vec<ExampleMatch>, max_distance: f32) -> Vec<ExampleMatch> {
    let mut nearest: HashMap<String, ExampleMatch> = HashMap::new();
    for hit in hits {
        if !hit.distance.is_finite() || hit.distance > max_distance {
            continue;
        }
        match nearest.get(&hit.verified_query_id) {
            Some(existing) if existing.distance <= hit.distance => {},
            _ => {
                nearest.insert(hit.verified_query_id.clone(), hit);
            },
        }
    }
    let mut out: Vec<ExampleMatch> = nearest.into_values().collect();
    out.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    out
}

pub(crate) fn rank_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| b.query.verified_at.cmp(&a.query.verified_at))
    });
}

fn resolve_selection(
    selection: SelectionJson,
    candidates: &[Candidate],
    content: &str,
) -> Result<MatchOutcome, ServiceError> {
    let chosen = match (&selection.query_id, selection.best_match_index) {
        (Some(id), _) => candidates.iter().find(|c| &c.query.id == id),
        (None, Some(index)) => index.checked_sub(1).and_then(|i| candidates.get(i)),
        (None, None) => {
            return Ok(MatchOutcome::NoMatch { reasoning: selection.reasoning });
        },
    };
    let Some(chosen) = chosen else {
        return Err(LlmError::MalformedResponse {
            context: PromptKind::SelectMatch.as_str().to_owned(),
            detail: "selected query is not among the candidates".to_owned(),
            content: smart_query_llm::truncate(content, 300).to_owned(),
        }
        .into());
    };
    tracing::info!(
        query_id = %chosen.query.id,
        distance = chosen.distance,
        confidence = selection.confidence,
        "verified query selected"
    );
    Ok(MatchOutcome::Matched(MatchedQuery {
        query: Arc::clone(&chosen.query),
        matched_question: chosen.matched_question.clone(),
        distance: chosen.distance,
        confidence: selection.confidence,
        reasoning: selection.reasoning,
    }))
}

#[cfg(test)]
#[path = "matcher_tests.rs"]
mod tests;
