//! Intent clarification prompt.

use smart_query_core::ConversationContext;

use crate::ai_types::{ClarificationJson, ClarificationPayload};
use crate::error::LlmError;
use crate::provider::{parse_json_response, PromptKind, StructuredPrompt};

const SYSTEM: &str = "You are an expert business data analyst. Your task is to decide whether a \
question to a reporting database is ambiguous and, if it is, offer clear rephrasings so the user \
can confirm their intent.";

#[must_use]
pub fn clarification_prompt(question: &str, context: &ConversationContext) -> StructuredPrompt {
    let user = format!(
        r#"Question: "{question}"

Use the context below only if it is directly relevant to resolving ambiguity:
{context}

Decide whether the question can be answered without guessing. When in doubt, treat it as
ambiguous: asking is better than guessing.

If it is ambiguous, write 2-4 interpretations. Rules:
1. The first option is the original question.
2. Each option is a complete, well-formed question with a plausible reading of the intent.
3. Options may differ in time period, filters implied by the user profile, metric
   (totals, counts, averages) or grouping level.
4. Never change what the user is fundamentally asking for.

Return JSON:
{{"ambiguous": true|false,
  "clarifications": [{{"text": "...", "explanation": "one sentence on this reading"}}]}}
Use an empty "clarifications" list when "ambiguous" is false."#,
        context = context.render(),
    );
    StructuredPrompt::json(PromptKind::Clarify, SYSTEM, user).with_temperature(0.2)
}

/// Accepts the wrapper object or a bare array of options.
///
/// # Errors
/// `LlmError::MalformedResponse` when neither shape parses.
pub fn parse_clarification(content: &str) -> Result<ClarificationJson, LlmError> {
    parse_json_response::<ClarificationPayload>(PromptKind::Clarify, content).map(Into::into)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_prompt_includes_question_and_calendar() {
        let ctx = ConversationContext::for_date(NaiveDate::from_ymd_opt(2025, 2, 10).unwrap());
        let prompt = clarification_prompt("show my team's performance", &ctx);
        assert_eq!(prompt.kind, PromptKind::Clarify);
        assert!(prompt.user.contains("show my team's performance"));
        assert!(prompt.user.contains("Previous month: 2025-01"));
    }

    #[test]
    fn test_parse_wrapped_and_bare() {
        let wrapped = parse_clarification(
            r#"{"ambiguous": true, "clarifications": [{"text": "a", "explanation": "x"}, {"text": "b", "explanation": "y"}]}"#,
        )
        .unwrap();
        assert!(wrapped.ambiguous);
        assert_eq!(wrapped.clarifications.len(), 2);

        let bare = parse_clarification(r#"[{"text": "a", "rationale": "x"}]"#).unwrap();
        assert!(bare.ambiguous);
        assert_eq!(bare.clarifications[0].explanation, "x");

        let clear = parse_clarification(r#"{"ambiguous": false}"#).unwrap();
        assert!(!clear.ambiguous);
        assert!(clear.clarifications.is_empty());
    }
}
