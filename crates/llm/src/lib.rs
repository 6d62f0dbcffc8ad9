//! LLM integration for smart-query
//!
//! An OpenAI-compatible chat client behind the [`CompletionProvider`] seam,
//! plus one prompt builder and response parser per pipeline step.

mod adaptation;
mod ai_types;
mod clarification;
mod client;
pub mod error;
mod follow_up;
mod matching;
mod narrative;
mod provider;
#[cfg(test)]
mod retry_tests;

pub use adaptation::{
    modification_prompt, parse_modification, parse_recommendation, parse_review,
    recommendation_prompt, render_modifications, review_prompt, ReviewRequest,
};
pub use ai_types::{
    ClarificationJson, FollowUpJson, FollowUpsJson, ModificationJson, RecommendationJson,
    SelectionJson,
};
pub use clarification::{clarification_prompt, parse_clarification};
pub use client::{truncate, LlmClient, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::LlmError;
pub use follow_up::{follow_up_prompt, parse_follow_ups};
pub use matching::{parse_selection, selection_prompt, SelectionCandidate};
pub use narrative::narrative_prompt;
pub use provider::{
    complete_json, complete_text, parse_json_response, CompletionProvider, PromptKind,
    ResponseShape, StructuredPrompt,
};
