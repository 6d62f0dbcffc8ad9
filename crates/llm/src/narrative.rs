//! Short conversational answer written from the executed result set.

use smart_query_core::{ConversationContext, QueryResults};

use crate::client::truncate;
use crate::provider::{PromptKind, StructuredPrompt};

const SYSTEM: &str = "You are a business data analyst. Answer the question from the data you are \
given, directly and concisely.";

/// Rows included in the prompt; the rest are summarised by count.
const NARRATIVE_ROW_LIMIT: usize = 50;
const NARRATIVE_DATA_CHARS: usize = 6000;

#[must_use]
pub fn narrative_prompt(question: &str, results: &QueryResults, context: &ConversationContext) -> StructuredPrompt {
    let shown = &results.rows[..results.rows.len().min(NARRATIVE_ROW_LIMIT)];
    let data = serde_json::to_string(shown).unwrap_or_default();
    let omitted = results.rows.len().saturating_sub(shown.len());
    let more = if omitted > 0 || results.truncated {
        format!("\n(further rows omitted: {omitted}{})", if results.truncated { "+" } else { "" })
    } else {
        String::new()
    };

    let user = format!(
        r#"Answer the question in 1-2 sentences. If the data shows a compelling insight, add it
in a separate paragraph of 1-2 sentences; otherwise do not mention insights.
Avoid preambles like "According to the data". Use confident, declarative language.

Question: {question}

Columns: {columns}
Data: {data}{more}

Context:
{context}"#,
        columns = results.columns.join(", "),
        data = truncate(&data, NARRATIVE_DATA_CHARS),
        context = context.render(),
    );
    StructuredPrompt::text(PromptKind::Narrative, SYSTEM, user)
}
