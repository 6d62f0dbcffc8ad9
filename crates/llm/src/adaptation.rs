//! Prompts for tailoring a verified query: recommend, modify and review.

use std::fmt::Write as _;

use smart_query_core::{ConversationContext, Modification, ReviewResult, VerifiedQuery};

use crate::ai_types::{ModificationJson, RecommendationJson};
use crate::error::LlmError;
use crate::provider::{parse_json_response, PromptKind, StructuredPrompt};

const RECOMMEND_SYSTEM: &str = "You are an expert PostgreSQL developer. Analyse a verified SQL \
query and recommend the specific changes needed to answer the user's question.";

const MODIFY_SYSTEM: &str = "You are an expert PostgreSQL developer. Apply the requested \
modifications to a SQL query exactly, without adding anything else.";

const REVIEW_SYSTEM: &str = "You are an expert PostgreSQL reviewer. Check a modified SQL query \
for correctness and alignment with the user's intent.";

#[must_use]
pub fn recommendation_prompt(
    vq: &VerifiedQuery,
    question: &str,
    context: &ConversationContext,
) -> StructuredPrompt {
    let examples = vq.example_texts().map(|q| format!("  - {q}")).collect::<Vec<_>>().join("\n");
    let user = format!(
        r#"SQL:
{sql}

Explanation:
{explanation}

This SQL answers questions such as:
{examples}

Tailoring documentation:
{instructions}

Context for resolving relative periods and user references:
{context}

User question the SQL must be tailored to: {question}

Following the tailoring documentation, list exactly which changes are needed.
Rules:
- Do not assume tables or columns that are not in the SQL or the documentation.
- Do not join additional tables unless the SQL or documentation mentions them.
- Do not leave placeholders unresolved.
- If the SQL already answers the question, return no modifications.

Return JSON:
{{"modifications_needed": true|false,
  "enhanced_question": "the question restated with periods and references resolved",
  "modifications": [{{"type": "filter|column|grouping|sorting|aggregation|time_period|limit|join|alias",
                      "description": "the change", "sql_impact": "how the SQL changes"}}],
  "explanation": "why these changes"}}"#,
        sql = vq.sql,
        explanation = vq.explanation,
        instructions = vq.instructions_or_default(),
        context = context.render(),
    );
    StructuredPrompt::json(PromptKind::Recommend, RECOMMEND_SYSTEM, user)
}

/// # Errors
/// `LlmError::MalformedResponse` when the answer is not a recommendation object.
pub fn parse_recommendation(content: &str) -> Result<RecommendationJson, LlmError> {
    parse_json_response(PromptKind::Recommend, content)
}

/// Deterministic rendering of the modification list, numbered from 1.
#[must_use]
pub fn render_modifications(modifications: &[Modification]) -> String {
    let mut out = String::new();
    for (i, m) in modifications.iter().enumerate() {
        _ = writeln!(
            out,
            "{}. [{}] {} (SQL impact: {})",
            i.saturating_add(1),
            m.kind,
            m.description,
            m.sql_impact
        );
    }
    out
}

/// Temperature 0 and a fixed layout: identical inputs produce identical prompts.
#[must_use]
pub fn modification_prompt(
    sql: &str,
    modifications: &[Modification],
    enhanced_question: &str,
) -> StructuredPrompt {
    let user = format!(
        r#"Original SQL:
{sql}

Question the result must answer: {enhanced_question}

Modifications (apply every one of them):
{mods}
Column alias guidelines:
- Change an alias only if necessary.
- Keep prefixes, quote style and capitalisation.

Return JSON:
{{"sql": "the complete modified SQL",
  "explanation": "what the modified SQL now computes",
  "applied": [numbers of the modifications you applied]}}"#,
        mods = render_modifications(modifications),
    );
    StructuredPrompt::json(PromptKind::Modify, MODIFY_SYSTEM, user).with_temperature(0.0)
}

/// # Errors
/// `LlmError::MalformedResponse` when the answer has no SQL.
pub fn parse_modification(content: &str) -> Result<ModificationJson, LlmError> {
    let parsed: ModificationJson = parse_json_response(PromptKind::Modify, content)?;
    if parsed.sql.trim().is_empty() {
        return Err(LlmError::malformed(PromptKind::Modify.as_str(), "empty sql", content));
    }
    Ok(parsed)
}

/// Inputs of one review iteration.
#[derive(Debug, Clone, Copy)]
pub struct ReviewRequest<'a> {
    pub verified_query: &'a VerifiedQuery,
    pub candidate_sql: &'a str,
    pub original_question: &'a str,
    pub enhanced_question: &'a str,
    pub iteration: u32,
    pub max_iterations: u32,
}

#[must_use]
pub fn review_prompt(request: &ReviewRequest<'_>) -> StructuredPrompt {
    let vq = request.verified_query;
    let tables = vq.tables_used.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
    let user = format!(
        r#"Review pass {iteration} of {max}.

Original verified SQL:
```sql
{original_sql}
```

Modified SQL:
```sql
{candidate_sql}
```

Original user question: {original_question}
Enhanced user question: {enhanced_question}

SQL explanation:
{explanation}

Modification instructions:
{instructions}

Tables used: {tables}

Identify any:
1. Syntax or logical errors
2. Table or column names not present in the original SQL or the instructions
3. Misalignment with the question's intent
4. Missing filters, grouping or sorting needed to answer the question

Return JSON:
{{"is_valid": true|false,
  "issues": ["..."],
  "suggestions": ["..."],
  "explanation": "brief summary of the findings",
  "corrected_sql": "complete corrected SQL, or null if the modified SQL is fine"}}"#,
        iteration = request.iteration,
        max = request.max_iterations,
        original_sql = vq.sql,
        candidate_sql = request.candidate_sql,
        original_question = request.original_question,
        enhanced_question = request.enhanced_question,
        explanation = vq.explanation,
        instructions = vq.instructions_or_default(),
    );
    StructuredPrompt::json(PromptKind::Review, REVIEW_SYSTEM, user)
}

/// # Errors
/// `LlmError::MalformedResponse` when the answer is not a review object.
pub fn parse_review(content: &str) -> Result<ReviewResult, LlmError> {
    let mut review: ReviewResult = parse_json_response(PromptKind::Review, content)?;
    review.corrected_sql = review.correction().map(|sql| {
        smart_query_core::strip_markdown_json(sql).to_owned()
    });
    Ok(review)
}

#[cfg(test)]
#[path = "adaptation_tests.rs"]
mod tests;
