//! Follow-up suggestions for the verified queries linked to the matched one.

use std::collections::HashSet;
use std::sync::Arc;

use smart_query_core::{FollowUpSuggestion, VerifiedQuery};
use smart_query_llm::{follow_up_prompt, parse_follow_ups, CompletionProvider};
use smart_query_storage::VerifiedQueryStore;

use crate::ServiceError;

pub struct FollowUpPlanner {
    llm: Arc<dyn CompletionProvider>,
    store: Arc<dyn VerifiedQueryStore>,
}

impl FollowUpPlanner {
    #[must_use]
    pub fn new(llm: Arc<dyn CompletionProvider>, store: Arc<dyn VerifiedQueryStore>) -> Self {
        Self { llm, store }
    }

    /// One suggestion per resolvable follow-up of `source`, in its listed order.
    pub async fn plan(
        &self,
        question: &str,
        source: &VerifiedQuery,
    ) -> Result<Vec<FollowUpSuggestion>, ServiceError> {
        let targets = self.resolve_targets(source).await?;
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = follow_up_prompt(question, source, &targets);
        let content = self.llm.complete(&prompt).await?;
        let parsed = parse_follow_ups(&content)?;

        let suggestions = targets
            .iter()
            .filter_map(|target| {
                let synthesized = parsed
                    .follow_ups
                    .iter()
                    .find(|f| f.query_id.trim() == target.id && !f.question.trim().is_empty())
                    .map(|f| f.question.trim().to_owned());
                let text = synthesized.or_else(|| {
                    tracing::debug!(query_id = %target.id, "no synthesized follow-up, using an example question");
                    target.example_texts().next().map(str::to_owned)
                })?;
                Some(FollowUpSuggestion { source_query_id: target.id.clone(), question: text })
            })
            .collect();
        Ok(suggestions)
    }

    async fn resolve_targets(&self, source: &VerifiedQuery) -> Result<Vec<VerifiedQuery>, ServiceError> {
        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        for id in &source.follow_ups {
            if id == &source.id || !seen.insert(id.as_str()) {
                continue;
            }
            match self.store.get(id).await {
                Ok(target) => targets.push(target),
                Err(e) if e.is_not_found() => {
                    tracing::warn!(
                        query_id = %source.id,
                        follow_up_id = %id,
                        "dangling follow-up reference, skipping"
                    );
                },
                Err(e) => return Err(e.into()),
            }
        }
        Ok(targets)
    }
}
