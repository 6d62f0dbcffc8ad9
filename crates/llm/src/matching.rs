//! Verified query selection prompt.

use std::fmt::Write as _;

use smart_query_core::VerifiedQuery;

use crate::ai_types::SelectionJson;
use crate::error::LlmError;
use crate::provider::{parse_json_response, PromptKind, StructuredPrompt};

const SYSTEM: &str = "You are an expert at matching user questions with verified SQL queries. \
Select the single most appropriate verified query, or say that none of them answers the question.";

/// One deduplicated candidate shown to the model.
#[derive(Debug, Clone, Copy)]
pub struct SelectionCandidate<'a> {
    pub query: &'a VerifiedQuery,
    pub matched_question: &'a str,
    pub distance: f32,
}

#[must_use]
pub fn selection_prompt(question: &str, candidates: &[SelectionCandidate<'_>]) -> StructuredPrompt {
    let mut listing = String::new();
    for (i, candidate) in candidates.iter().enumerate() {
        let vq = candidate.query;
        _ = writeln!(listing, "Candidate {}:", i.saturating_add(1));
        _ = writeln!(listing, "Id: {}", vq.id);
        _ = writeln!(listing, "Name: {}", vq.name);
        _ = writeln!(listing, "Explanation: {}", vq.explanation);
        _ = writeln!(listing, "Tailoring instructions: {}", vq.instructions_or_default());
        _ = writeln!(listing, "Example questions:");
        for example in vq.example_texts() {
            _ = writeln!(listing, "  - {example}");
        }
        _ = writeln!(
            listing,
            "Closest example: {} (distance {:.3})\n",
            candidate.matched_question, candidate.distance
        );
    }

    let user = format!(
        r#"User question: {question}

Candidate verified queries:
{listing}
Analyse the meaning of the question, not just shared keywords. A candidate qualifies only if
its SQL can be tailored (filters, periods, grouping, sorting) to answer the question.

Return JSON:
{{"query_id": "<id of the best candidate, or null if none qualifies>",
  "confidence": <number between 0 and 1>,
  "reasoning": "why this candidate, or why none"}}"#
    );
    StructuredPrompt::json(PromptKind::SelectMatch, SYSTEM, user)
}

/// # Errors
/// `LlmError::MalformedResponse` when the answer is not a selection object.
pub fn parse_selection(content: &str) -> Result<SelectionJson, LlmError> {
    let mut selection: SelectionJson = parse_json_response(PromptKind::SelectMatch, content)?;
    selection.query_id = selection.query_id.map(|id| id.trim().to_owned()).filter(|id| {
        !id.is_empty() && !id.eq_ignore_ascii_case("null") && !id.eq_ignore_ascii_case("none")
    });
    selection.confidence = selection.confidence.clamp(0.0, 1.0);
    Ok(selection)
}
