//! Verified query library types.
//!
//! A verified query is a curated, pre-validated SQL template. The curation
//! workflow owns writes; everything in this workspace only reads them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Example question answered by a verified query, bound 1:1 to its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleQuestion {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl ExampleQuestion {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), embedding: None }
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Curated SQL template with the metadata needed to match and tailor it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedQuery {
    /// Unique, stable identifier
    pub id: String,
    pub name: String,
    pub sql: String,
    /// What the SQL computes, in plain language
    #[serde(alias = "query_explanation")]
    pub explanation: String,
    /// Free-text documentation on how the SQL may be tailored
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub tables_used: BTreeSet<String>,
    /// Ordered example questions this query answers
    #[serde(default)]
    pub questions: Vec<ExampleQuestion>,
    /// Identifiers of related verified queries
    #[serde(default)]
    pub follow_ups: Vec<String>,
    pub verified_by: String,
    pub verified_at: DateTime<Utc>,
}

impl VerifiedQuery {
    pub fn example_texts(&self) -> impl Iterator<Item = &str> {
        self.questions.iter().map(|q| q.text.as_str())
    }

    #[must_use]
    pub fn instructions_or_default(&self) -> &str {
        self.instructions.as_deref().filter(|s| !s.trim().is_empty()).unwrap_or("None provided")
    }

    #[must_use]
    pub fn summary(&self) -> MatchedQuerySummary {
        MatchedQuerySummary {
            id: self.id.clone(),
            name: self.name.clone(),
            sql: self.sql.clone(),
            explanation: self.explanation.clone(),
        }
    }
}

/// The part of a verified query shown to observers when it is matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedQuerySummary {
    pub id: String,
    pub name: String,
    pub sql: String,
    pub explanation: String,
}

/// One example question as stored in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleRecord {
    pub example_id: String,
    pub verified_query_id: String,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
}

/// Nearest-neighbour hit returned by vector search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleMatch {
    pub example_id: String,
    pub verified_query_id: String,
    pub question_text: String,
    /// Cosine distance (`0.0` identical, `2.0` opposite)
    pub distance: f32,
}

/// Cosine distance between two vectors, `None` on dimension mismatch or zero norm.
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    let similarity = (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0);
    #[expect(clippy::cast_possible_truncation, reason = "distance is within 0.0..=2.0")]
    Some((1.0 - similarity) as f32)
}
