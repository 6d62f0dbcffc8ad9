//! Wire types for the chat-completions API and the JSON shapes each step asks for.

use serde::{Deserialize, Serialize};
use smart_query_core::{Clarification, Modification, Recommendation};

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Deserialize)]
pub(crate) struct Choice {
    pub message: ResponseMessage,
}

#[derive(Deserialize)]
pub(crate) struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Clarification step: whether to ask, and what to offer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClarificationJson {
    #[serde(default = "default_true")]
    pub ambiguous: bool,
    #[serde(default, alias = "options")]
    pub clarifications: Vec<Clarification>,
}

/// Some models answer with the bare option array instead of the wrapper object.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum ClarificationPayload {
    Wrapped(ClarificationJson),
    Bare(Vec<Clarification>),
}

impl From<ClarificationPayload> for ClarificationJson {
    fn from(payload: ClarificationPayload) -> Self {
        match payload {
            ClarificationPayload::Wrapped(json) => json,
            ClarificationPayload::Bare(clarifications) => Self { ambiguous: true, clarifications },
        }
    }
}

/// Selection step: one candidate id, or `null` for no match.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SelectionJson {
    #[serde(default)]
    pub query_id: Option<String>,
    /// 1-based candidate index, accepted when the model omits `query_id`.
    #[serde(default)]
    pub best_match_index: Option<usize>,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecommendationJson {
    #[serde(default)]
    pub modifications_needed: Option<bool>,
    #[serde(default)]
    pub enhanced_question: Option<String>,
    #[serde(default)]
    pub modifications: Vec<Modification>,
    #[serde(default)]
    pub explanation: String,
}

impl RecommendationJson {
    /// `modifications_needed: false` wins over a stray modification list.
    #[must_use]
    pub fn into_recommendation(self, question: &str) -> Recommendation {
        let modifications =
            if self.modifications_needed == Some(false) { Vec::new() } else { self.modifications };
        let enhanced_question = self
            .enhanced_question
            .map(|q| q.trim().to_owned())
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| question.to_owned());
        Recommendation { enhanced_question, modifications, explanation: self.explanation }
    }
}

/// Modify step: rewritten SQL plus the 1-based modifications it applied.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModificationJson {
    pub sql: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub applied: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FollowUpJson {
    pub query_id: String,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FollowUpsJson {
    #[serde(default)]
    pub follow_ups: Vec<FollowUpJson>,
}

const fn default_true() -> bool {
    true
}
