//! Bounded review loop policy.
//!
//! Each pass either accepts the candidate SQL or replaces it with the
//! reviewer's correction. The last pass never loops again: a correction
//! there becomes the final SQL and the turn is flagged as exhausted.

use smart_query_core::ReviewResult;

/// What a single review pass decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    /// No (different) correction: keep the candidate.
    Accept,
    /// Replace the candidate and review again.
    Revise(String),
    /// Replace the candidate and stop reviewing.
    Exhausted(String),
}

/// SQL handed to the executor together with how the review loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalSql {
    pub sql: String,
    pub review_applied: bool,
    pub max_iterations_reached: bool,
    pub residual_concerns: Option<String>,
}

impl FinalSql {
    /// The verified SQL used without any review.
    #[must_use]
    pub fn unreviewed(sql: &str) -> Self {
        Self { sql: sql.to_owned(), review_applied: false, max_iterations_reached: false, residual_concerns: None }
    }
}

#[must_use]
pub fn review_decision(
    iteration: u32,
    max_iterations: u32,
    review: &ReviewResult,
    candidate_sql: &str,
) -> ReviewDecision {
    let Some(correction) = review.correction().filter(|sql| !same_sql(sql, candidate_sql)) else {
        return ReviewDecision::Accept;
    };
    if iteration >= max_iterations {
        ReviewDecision::Exhausted(correction.to_owned())
    } else {
        ReviewDecision::Revise(correction.to_owned())
    }
}

/// Equal up to whitespace and trailing semicolons.
fn same_sql(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

fn normalize(sql: &str) -> String {
    let trimmed = sql.trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}
