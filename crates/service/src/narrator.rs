//! Conversational answer written from the executed rows.

use std::sync::Arc;

use smart_query_core::{ConversationContext, QueryResults};
use smart_query_llm::{complete_text, narrative_prompt, CompletionProvider};

pub struct AnswerNarrator {
    llm: Arc<dyn CompletionProvider>,
}

impl AnswerNarrator {
    #[must_use]
    pub fn new(llm: Arc<dyn CompletionProvider>) -> Self {
        Self { llm }
    }

    /// Never fails the turn: any error degrades to no narrative.
    pub async fn narrate(
        &self,
        question: &str,
        results: &QueryResults,
        context: &ConversationContext,
    ) -> Option<String> {
        let prompt = narrative_prompt(question, results, context);
        match complete_text(self.llm.as_ref(), &prompt).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(error = %e, "narrative generation failed, returning rows only");
                None
            },
        }
    }
}
