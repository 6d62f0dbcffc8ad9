//! Completion seam between pipeline steps and the model backend.

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use smart_query_core::{extract_json_payload, strip_markdown_json};

use crate::error::LlmError;

/// Which pipeline step a prompt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Clarify,
    SelectMatch,
    Recommend,
    Modify,
    Review,
    FollowUp,
    Narrative,
}

impl PromptKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Clarify => "clarify",
            Self::SelectMatch => "select_match",
            Self::Recommend => "recommend",
            Self::Modify => "modify",
            Self::Review => "review",
            Self::FollowUp => "follow_up",
            Self::Narrative => "narrative",
        }
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the step expects a JSON object or free text back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    Json,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructuredPrompt {
    pub kind: PromptKind,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub shape: ResponseShape,
}

impl StructuredPrompt {
    #[must_use]
    pub fn json(kind: PromptKind, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self { kind, system: system.into(), user: user.into(), temperature: 0.1, shape: ResponseShape::Json }
    }

    #[must_use]
    pub fn text(kind: PromptKind, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self { kind, system: system.into(), user: user.into(), temperature: 0.0, shape: ResponseShape::Text }
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Opaque model capability: prompt in, raw content out.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// # Errors
    /// Provider failures (transport, auth, exhausted retries) only; content
    /// validation happens in [`complete_json`] and [`complete_text`].
    async fn complete(&self, prompt: &StructuredPrompt) -> Result<String, LlmError>;
}

/// Run a JSON prompt and deserialize the answer.
///
/// # Errors
/// Provider errors pass through; unparseable content becomes
/// `LlmError::MalformedResponse`.
pub async fn complete_json<T, P>(provider: &P, prompt: &StructuredPrompt) -> Result<T, LlmError>
where
    T: DeserializeOwned,
    P: CompletionProvider + ?Sized,
{
    let content = provider.complete(prompt).await?;
    parse_json_response(prompt.kind, &content)
}

/// Run a text prompt and return the trimmed answer without code fences.
///
/// # Errors
/// Provider errors pass through; a blank answer is `MalformedResponse`.
pub async fn complete_text<P>(provider: &P, prompt: &StructuredPrompt) -> Result<String, LlmError>
where
    P: CompletionProvider + ?Sized,
{
    let content = provider.complete(prompt).await?;
    let text = strip_markdown_json(&content);
    if text.is_empty() {
        return Err(LlmError::malformed(prompt.kind.as_str(), "empty text", &content));
    }
    Ok(text.to_owned())
}

/// Parse model output as `T`, tolerating code fences and surrounding prose.
///
/// # Errors
/// `LlmError::MalformedResponse` when no JSON payload of the right shape is found.
pub fn parse_json_response<T: DeserializeOwned>(kind: PromptKind, content: &str) -> Result<T, LlmError> {
    let first_error = match serde_json::from_str(strip_markdown_json(content)) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    if let Some(payload) = extract_json_payload(content) {
        if let Ok(value) = serde_json::from_str(payload) {
            return Ok(value);
        }
    }
    Err(LlmError::malformed(kind.as_str(), first_error.to_string(), content))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Answer {
        value: u32,
    }

    #[test]
    fn test_parse_plain_and_fenced() {
        let a: Answer = parse_json_response(PromptKind::Review, r#"{"value": 1}"#).unwrap();
        assert_eq!(a, Answer { value: 1 });
        let b: Answer =
            parse_json_response(PromptKind::Review, "```json\n{\"value\": 2}\n```").unwrap();
        assert_eq!(b, Answer { value: 2 });
    }

    #[test]
    fn test_parse_json_inside_prose() {
        let a: Answer =
            parse_json_response(PromptKind::Recommend, "Here you go: {\"value\": 3}. Done.").unwrap();
        assert_eq!(a.value, 3);
    }

    #[test]
    fn test_parse_wrong_shape_is_malformed() {
        let err = parse_json_response::<Answer>(PromptKind::Modify, r#"{"other": true}"#).unwrap_err();
        assert!(err.is_malformed());
        assert!(err.to_string().contains("modify"));

        let err = parse_json_response::<Answer>(PromptKind::Modify, "no json at all").unwrap_err();
        assert!(matches!(err, LlmError::MalformedResponse { .. }));
    }
}
