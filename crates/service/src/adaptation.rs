//! Tailors a verified query to the question: recommend, modify, review.

use std::sync::Arc;

use smart_query_core::{ConversationContext, ModifiedQuery, Recommendation, ReviewResult, VerifiedQuery};
use smart_query_llm::{
    modification_prompt, parse_modification, parse_recommendation, parse_review,
    recommendation_prompt, review_prompt, CompletionProvider, ReviewRequest,
};

use crate::ServiceError;

pub struct QueryAdaptationEngine {
    llm: Arc<dyn CompletionProvider>,
}

impl QueryAdaptationEngine {
    #[must_use]
    pub fn new(llm: Arc<dyn CompletionProvider>) -> Self {
        Self { llm }
    }

    pub async fn recommend(
        &self,
        query: &VerifiedQuery,
        question: &str,
        context: &ConversationContext,
    ) -> Result<Recommendation, ServiceError> {
        let prompt = recommendation_prompt(query, question, context);
        let content = self.llm.complete(&prompt).await?;
        let recommendation = parse_recommendation(&content)?.into_recommendation(question);
        tracing::debug!(
            query_id = %query.id,
            modifications = recommendation.modifications.len(),
            "recommendation received"
        );
        Ok(recommendation)
    }

    /// Applies the whole modification list or fails; partial rewrites are rejected.
    pub async fn modify(
        &self,
        sql: &str,
        recommendation: &Recommendation,
    ) -> Result<ModifiedQuery, ServiceError> {
        let modifications = &recommendation.modifications;
        let prompt = modification_prompt(sql, modifications, &recommendation.enhanced_question);
        let content = self.llm.complete(&prompt).await?;
        let parsed = parse_modification(&content)?;
        check_applied(&parsed.applied, modifications.len())?;
        Ok(ModifiedQuery { sql: parsed.sql.trim().to_owned(), explanation: parsed.explanation })
    }

    pub async fn review(&self, request: &ReviewRequest<'_>) -> Result<ReviewResult, ServiceError> {
        let prompt = review_prompt(request);
        let content = self.llm.complete(&prompt).await?;
        Ok(parse_review(&content)?)
    }
}

/// Every modification `1..=expected` must be reported as applied.
pub(crate) fn check_applied(applied: &[usize], expected: usize) -> Result<(), ServiceError> {
    if let Some(unknown) = applied.iter().find(|&&n| n == 0 || n > expected) {
        return Err(ServiceError::Adaptation(format!(
            "modification {unknown} does not exist (expected 1 to {expected})"
        )));
    }
    let missing: Vec<String> = (1..=expected)
        .filter(|n| !applied.contains(n))
        .map(|n| n.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ServiceError::Adaptation(format!(
            "the SQL could not be adapted: modification(s) {} were not applied",
            missing.join(", ")
        )));
    }
    Ok(())
}
