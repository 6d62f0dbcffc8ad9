//! Follow-up question synthesis prompt.

use std::fmt::Write as _;

use smart_query_core::VerifiedQuery;

use crate::ai_types::FollowUpsJson;
use crate::error::LlmError;
use crate::provider::{parse_json_response, PromptKind, StructuredPrompt};

const SYSTEM: &str = "You suggest natural next questions in a data conversation. Each \
suggestion must be answerable by the verified query it is written for.";

#[must_use]
pub fn follow_up_prompt(question: &str, source: &VerifiedQuery, targets: &[VerifiedQuery]) -> StructuredPrompt {
    let mut listing = String::new();
    for target in targets {
        _ = writeln!(listing, "Query id: {}", target.id);
        _ = writeln!(listing, "Name: {}", target.name);
        _ = writeln!(listing, "Explanation: {}", target.explanation);
        _ = writeln!(listing, "Example questions:");
        for example in target.example_texts() {
            _ = writeln!(listing, "  - {example}");
        }
        listing.push('\n');
    }

    let user = format!(
        r#"The user just asked: {question}
It was answered with "{source_name}": {source_explanation}

Related verified queries:
{listing}
For each related query write exactly one short follow-up question the user could ask next.
Ground it in that query's example questions and carry over the periods and filters from the
user's question where they make sense.

Return JSON:
{{"follow_ups": [{{"query_id": "...", "question": "..."}}]}}"#,
        source_name = source.name,
        source_explanation = source.explanation,
    );
    StructuredPrompt::json(PromptKind::FollowUp, SYSTEM, user).with_temperature(0.3)
}

/// # Errors
/// `LlmError::MalformedResponse` when the answer is not a follow-up object.
pub fn parse_follow_ups(content: &str) -> Result<FollowUpsJson, LlmError> {
    parse_json_response(PromptKind::FollowUp, content)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use smart_query_core::ExampleQuestion;

    use super::*;

    fn query(id: &str, example: &str) -> VerifiedQuery {
        VerifiedQuery {
            id: id.to_owned(),
            name: format!("Name {id}"),
            sql: "SELECT 1".to_owned(),
            explanation: format!("Explains {id}"),
            instructions: None,
            tables_used: Default::default(),
            questions: vec![ExampleQuestion::new(example)],
            follow_ups: vec![],
            verified_by: "a".to_owned(),
            verified_at: Utc::now(),
        }
    }

    #[test]
    fn test_prompt_lists_every_target() {
        let source = query("q1", "total premiums");
        let targets = [query("q2", "claims by region"), query("q3", "loss ratio by quarter")];
        let prompt = follow_up_prompt("total premiums last month", &source, &targets);
        assert!(prompt.user.contains("Query id: q2"));
        assert!(prompt.user.contains("loss ratio by quarter"));
        assert!(prompt.user.contains("\"Name q1\""));
    }

    #[test]
    fn test_parse_follow_ups() {
        let parsed = parse_follow_ups(r#"{"follow_ups": [{"query_id": "q2", "question": "And claims?"}]}"#).unwrap();
        assert_eq!(parsed.follow_ups.len(), 1);
        assert_eq!(parsed.follow_ups[0].query_id, "q2");

        let empty = parse_follow_ups("{}").unwrap();
        assert!(empty.follow_ups.is_empty());
    }
}
