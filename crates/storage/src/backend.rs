//! Unified verified query backend with enum dispatch.

use async_trait::async_trait;
use smart_query_core::{ExampleMatch, ExampleRecord, VerifiedQuery};

use crate::error::StorageError;
use crate::memory::MemoryStore;
use crate::pg_storage::PgStorage;
use crate::traits::{VectorSearch, VerifiedQueryStore};

macro_rules! dispatch {
    ($self:expr, $trait:path, $method:ident ( $($arg:expr),* $(,)? )) => {
        match $self {
            StorageBackend::Postgres(s) => <PgStorage as $trait>::$method(s, $($arg),*).await,
            StorageBackend::Memory(s) => <MemoryStore as $trait>::$method(s, $($arg),*).await,
        }
    };
}

#[derive(Clone, Debug)]
pub enum StorageBackend {
    Postgres(PgStorage),
    Memory(MemoryStore),
}

impl StorageBackend {
    pub async fn new_postgres(database_url: &str) -> Result<Self, StorageError> {
        Ok(Self::Postgres(PgStorage::new(database_url).await?))
    }

    pub fn new_memory(store: MemoryStore) -> Self {
        Self::Memory(store)
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }
}

// ── VerifiedQueryStore ───────────────────────────────────────────

#[async_trait]
impl VerifiedQueryStore for StorageBackend {
    async fn get(&self, id: &str) -> Result<VerifiedQuery, StorageError> {
        dispatch!(self, VerifiedQueryStore, get(id))
    }

    async fn all_examples(&self) -> Result<Vec<ExampleRecord>, StorageError> {
        dispatch!(self, VerifiedQueryStore, all_examples())
    }
}

// ── VectorSearch ─────────────────────────────────────────────────

#[async_trait]
impl VectorSearch for StorageBackend {
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<ExampleMatch>, StorageError> {
        dispatch!(self, VectorSearch, search(embedding, k))
    }
}
