use std::time::Duration;

use serde::Deserialize;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::client::LlmClient;
use crate::error::LlmError;
use crate::provider::{complete_json, complete_text, CompletionProvider, PromptKind, StructuredPrompt};

fn client_for(server: &MockServer) -> LlmClient {
    LlmClient::new("test-key".to_owned(), server.uri())
        .unwrap()
        .with_model("test-model".to_owned())
        .with_retry_unit(Duration::from_millis(1))
}

fn review_prompt() -> StructuredPrompt {
    StructuredPrompt::json(PromptKind::Review, "Review the SQL.", "SELECT 1")
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "choices": [{
            "message": {
                "content": content,
                "role": "assistant"
            }
        }]
    }))
}

#[tokio::test]
async fn test_success_on_first_attempt() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-model",
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": "Review the SQL."},
                {"role": "user", "content": "SELECT 1"}
            ]
        })))
        .respond_with(completion("{\"is_valid\": true}"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.complete(&review_prompt()).await.unwrap();
    assert_eq!(result, "{\"is_valid\": true}");
}

#[tokio::test]
async fn test_text_prompt_omits_response_format() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({"response_format": {"type": "json_object"}})))
        .respond_with(ResponseTemplate::new(400).set_body_string("unexpected json mode"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion("```\nJanuary premiums were 1.2M.\n```"))
        .mount(&server)
        .await;

    let prompt = StructuredPrompt::text(PromptKind::Narrative, "s", "u");
    let text = complete_text(&client, &prompt).await.unwrap();
    assert_eq!(text, "January premiums were 1.2M.");
}

#[tokio::test]
async fn test_transient_status_is_retried() {
    for (code, reason) in [(429, "Rate limit exceeded"), (503, "Service Unavailable")] {
        let server = MockServer::start().await;
        let client = client_for(&server);

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(code).set_body_string(reason))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(completion("{\"is_valid\": true}"))
            .expect(1)
            .mount(&server)
            .await;

        let result = client.complete(&review_prompt()).await.unwrap();
        assert_eq!(result, "{\"is_valid\": true}", "after HTTP {code}");
    }
}

#[tokio::test]
async fn test_no_retry_on_401() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.complete(&review_prompt()).await.unwrap_err();
    assert!(!err.is_malformed());
    assert_eq!(err.to_string(), "HTTP status 401: Unauthorized");
}

#[tokio::test]
async fn test_all_retries_exhausted() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .expect(4)
        .mount(&server)
        .await;

    let err = client.complete(&review_prompt()).await.unwrap_err();
    assert!(matches!(err, LlmError::RetriesExhausted(_)));
    assert!(err.to_string().ends_with("HTTP status 503: Service Unavailable"));
}

#[tokio::test]
async fn test_empty_choices_is_empty_response() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
        .mount(&server)
        .await;

    let err = client.complete(&review_prompt()).await.unwrap_err();
    assert!(matches!(err, LlmError::EmptyResponse));
}

#[derive(Debug, Deserialize)]
struct Verdict {
    is_valid: bool,
}

#[tokio::test]
async fn test_complete_json_malformed_content() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion("I think the SQL looks fine."))
        .expect(1)
        .mount(&server)
        .await;

    let err = complete_json::<Verdict, _>(&client, &review_prompt()).await.unwrap_err();
    assert!(err.is_malformed());
}

#[tokio::test]
async fn test_complete_json_fenced_content() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion("```json\n{\"is_valid\": true}\n```"))
        .mount(&server)
        .await;

    let verdict: Verdict = complete_json(&client, &review_prompt()).await.unwrap();
    assert!(verdict.is_valid);
}
