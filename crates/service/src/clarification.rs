//! Decides whether a question needs the user to confirm its intent.

use std::sync::Arc;

use smart_query_core::{Clarification, ConversationContext};
use smart_query_llm::{clarification_prompt, parse_clarification, CompletionProvider};

use crate::ServiceError;

/// Result of the ambiguity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarificationOutcome {
    /// The question can be answered as asked.
    Clear,
    /// Ordered rephrasings; always at least two.
    Ask(Vec<Clarification>),
}

pub struct ClarificationResolver {
    llm: Arc<dyn CompletionProvider>,
}

impl ClarificationResolver {
    #[must_use]
    pub fn new(llm: Arc<dyn CompletionProvider>) -> Self {
        Self { llm }
    }

    pub async fn resolve(
        &self,
        question: &str,
        context: &ConversationContext,
    ) -> Result<ClarificationOutcome, ServiceError> {
        let prompt = clarification_prompt(question, context);
        let content = self.llm.complete(&prompt).await?;
        let parsed = parse_clarification(&content)?;
        if !parsed.ambiguous {
            return Ok(ClarificationOutcome::Clear);
        }
        let options = distinct_options(parsed.clarifications);
        if options.len() < 2 {
            tracing::debug!(options = options.len(), "ambiguous but fewer than two options, not asking");
            return Ok(ClarificationOutcome::Clear);
        }
        Ok(ClarificationOutcome::Ask(options))
    }
}

/// Drops blank and repeated rephrasings, keeping the model's order.
fn distinct_options(options: Vec<Clarification>) -> Vec<Clarification> {
    let mut seen = std::collections::HashSet::new();
    options
        .into_iter()
        .filter_map(|mut option| {
            option.text = option.text.trim().to_owned();
            if option.text.is_empty() || !seen.insert(option.text.to_lowercase()) {
                return None;
            }
            Some(option)
        })
        .collect()
}
