//! Typed error enum for the service layer.
//!
//! Unifies storage, execution, LLM and embedding failures so the orchestrator
//! can report which stage ended a turn without downcasting.

use smart_query_embeddings::EmbeddingError;
use smart_query_llm::LlmError;
use smart_query_storage::{ExecutionError, StorageError};
use thiserror::Error;

/// Service-layer error unifying the collaborator failures.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Verified query store or vector search failed.
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    /// The business database rejected or could not run the SQL.
    #[error("execution: {0}")]
    Execution(#[from] ExecutionError),

    /// LLM provider failure or unusable response.
    #[error("llm: {0}")]
    Llm(#[from] LlmError),

    /// Embedding generation failed.
    #[error("embedding: {0}")]
    Embedding(#[from] EmbeddingError),

    /// The adaptation steps produced something that must not be executed.
    #[error("adaptation: {0}")]
    Adaptation(String),

    /// Caller provided invalid input (empty or oversized question).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The session task has ended and accepts no more actions.
    #[error("session closed")]
    SessionClosed,

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ServiceError {
    /// Whether this error is likely transient (worth asking again later).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_transient(),
            Self::Llm(e) => e.is_transient(),
            Self::Execution(ExecutionError::Unavailable(_)) => true,
            _ => false,
        }
    }

    /// Whether this error represents a not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(StorageError::NotFound { .. }))
    }

    /// Human-readable message safe to send to the client.
    pub fn user_message(&self) -> String {
        match self {
            Self::Execution(e) => e.user_message(),
            Self::Llm(e) if e.is_malformed() => {
                "The assistant returned a response that could not be understood".to_owned()
            },
            Self::Llm(_) => "The language model is currently unavailable".to_owned(),
            Self::Storage(e) if e.is_not_found() => e.to_string(),
            Self::Storage(_) => "The verified query library is currently unavailable".to_owned(),
            Self::Embedding(_) | Self::Join(_) => "The question could not be processed".to_owned(),
            Self::Adaptation(message) | Self::InvalidInput(message) => message.clone(),
            Self::SessionClosed => "The session has ended".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_message_is_verbatim() {
        let err = ServiceError::from(ExecutionError::Sql {
            message: "column \"lob\" does not exist".to_owned(),
        });
        assert_eq!(err.user_message(), "column \"lob\" does not exist");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_llm_messages_hide_details() {
        let err = ServiceError::from(LlmError::HttpStatus { code: 503, body: "secret".to_owned() });
        assert!(err.is_transient());
        assert!(!err.user_message().contains("secret"));

        let err = ServiceError::from(LlmError::MalformedResponse {
            context: "modify".to_owned(),
            detail: "empty sql".to_owned(),
            content: "{}".to_owned(),
        });
        assert!(err.user_message().contains("could not be understood"));
    }

    #[test]
    fn test_not_found() {
        let err = ServiceError::from(StorageError::NotFound { entity: "verified query", id: "q9".to_owned() });
        assert!(err.is_not_found());
        assert!(err.user_message().contains("q9"));
    }
}
