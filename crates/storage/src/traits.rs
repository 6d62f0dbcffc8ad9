//! Storage trait abstraction
//!
//! Async seams between the pipeline and its data collaborators. Every
//! implementation must be safe to share across concurrently running sessions.

use async_trait::async_trait;
use smart_query_core::{ExampleMatch, ExampleRecord, QueryResults, VerifiedQuery};

use crate::error::{ExecutionError, StorageError};

/// Read-only access to the verified query library.
#[async_trait]
pub trait VerifiedQueryStore: Send + Sync {
    /// Fetch a verified query with its example questions and follow-up ids.
    ///
    /// Returns `StorageError::NotFound` when the id does not exist.
    async fn get(&self, id: &str) -> Result<VerifiedQuery, StorageError>;

    /// Every example question in the library with its embedding, if computed.
    async fn all_examples(&self) -> Result<Vec<ExampleRecord>, StorageError>;
}

/// Nearest-neighbour search over example-question embeddings.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Up to `k` examples ranked by ascending cosine distance.
    async fn search(&self, embedding: &[f32], k: usize)
        -> Result<Vec<ExampleMatch>, StorageError>;
}

/// Runs generated SQL against the business database.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<QueryResults, ExecutionError>;
}
