//! Typed error enum for the LLM crate.

use thiserror::Error;

/// Errors from LLM API operations.
///
/// Provider failures (transport, auth, status) are kept apart from malformed
/// responses so callers can report which one ended a step.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),
    #[error("HTTP status {code}: {body}")]
    HttpStatus { code: u16, body: String },
    #[error("JSON parse error in {context}: {source}")]
    JsonParse {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed {context} response: {detail} (content: {content})")]
    MalformedResponse { context: String, detail: String, content: String },
    #[error("empty response: no choices returned")]
    EmptyResponse,
    #[error("client initialization failed: {0}")]
    ClientInit(String),
    #[error("all retries exhausted, last error: {0}")]
    RetriesExhausted(Box<LlmError>),
}

impl LlmError {
    /// Whether this error is transient and should be retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpRequest(_) => true,
            Self::HttpStatus { code, .. } => matches!(code, 429 | 500 | 502 | 503 | 529),
            _ => false,
        }
    }

    /// Whether the provider answered but the content could not be used.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedResponse { .. } | Self::JsonParse { .. })
    }

    pub(crate) fn malformed(
        context: impl Into<String>,
        detail: impl Into<String>,
        content: &str,
    ) -> Self {
        Self::MalformedResponse {
            context: context.into(),
            detail: detail.into(),
            content: crate::client::truncate(content, 300).to_owned(),
        }
    }
}
