use std::time::Duration;

use async_trait::async_trait;
use smart_query_core::env_parse_with_default;

use crate::ai_types::{ChatRequest, ChatResponse, Message, ResponseFormat};
use crate::error::LlmError;
use crate::provider::{CompletionProvider, ResponseShape, StructuredPrompt};

/// Default LLM model to use.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Default OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

const MAX_RETRIES: u32 = 3;

/// Client for an OpenAI-compatible chat-completions API.
pub struct LlmClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    retry_unit: Duration,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    /// Client for `base_url`; the model comes from `SMART_QUERY_MODEL`.
    ///
    /// # Errors
    /// `ClientInit` when the HTTP client cannot be built.
    pub fn new(api_key: String, base_url: String) -> Result<Self, LlmError> {
        let model = env_parse_with_default("SMART_QUERY_MODEL", DEFAULT_MODEL.to_owned());
        let base_url = base_url.trim_end_matches('/').to_owned();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| LlmError::ClientInit(e.to_string()))?;
        Ok(Self { client, api_key, base_url, model, retry_unit: Duration::from_secs(1) })
    }

    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Scales the back-off schedule (1, 2, 4 units).
    #[must_use]
    pub const fn with_retry_unit(mut self, unit: Duration) -> Self {
        self.retry_unit = unit;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    /// POST the request and return the first choice's content.
    ///
    /// Transient failures (transport errors, 429 and 5xx) are retried
    /// `MAX_RETRIES` times on a 1/2/4 unit back-off.
    ///
    /// # Errors
    /// The first permanent failure, or `RetriesExhausted` wrapping the last
    /// transient one.
    pub(crate) async fn chat_completion(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            let err = match self.send_once(request).await {
                Ok(content) => return Ok(content),
                Err(err) if err.is_transient() => err,
                Err(err) => return Err(err),
            };
            attempt += 1;
            if attempt > MAX_RETRIES {
                return Err(LlmError::RetriesExhausted(Box::new(err)));
            }
            let delay = self.retry_unit.saturating_mul(1 << (attempt - 1));
            tracing::warn!(attempt, max = MAX_RETRIES, ?delay, error = %err, "retrying LLM call");
            tokio::time::sleep(delay).await;
        }
    }

    async fn send_once(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::HttpStatus { code: status.as_u16(), body });
        }

        let body = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|source| {
            LlmError::JsonParse { context: format!("chat completion body {:?}", truncate(&body, 200)), source }
        })?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl CompletionProvider for LlmClient {
    async fn complete(&self, prompt: &StructuredPrompt) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message { role: "system".to_owned(), content: prompt.system.clone() },
                Message { role: "user".to_owned(), content: prompt.user.clone() },
            ],
            temperature: prompt.temperature,
            response_format: match prompt.shape {
                ResponseShape::Json => Some(ResponseFormat { format_type: "json_object".to_owned() }),
                ResponseShape::Text => None,
            },
        };
        tracing::debug!(step = %prompt.kind, model = %self.model, "LLM request");
        self.chat_completion(&request).await
    }
}

/// Longest prefix of `s` no longer than `max_len` bytes that ends on a char boundary.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let end = (0..=max_len).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
    s.get(..end).unwrap_or_default()
}
