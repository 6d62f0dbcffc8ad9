pub(crate) mod catalog;
pub(crate) mod chat;
pub(crate) mod inspect;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use smart_query_embeddings::{EmbeddingProvider, EmbeddingService};
use smart_query_llm::{CompletionProvider, LlmClient};
use smart_query_storage::StorageBackend;

use crate::{get_api_key, get_base_url, get_database_url};

pub(crate) fn llm_client() -> Result<Arc<dyn CompletionProvider>> {
    let client = LlmClient::new(get_api_key()?, get_base_url())?;
    tracing::info!(base_url = client.base_url(), model = client.model(), "LLM client ready");
    Ok(Arc::new(client))
}

/// Model loading is slow and may download weights; keep it off the runtime.
pub(crate) async fn load_embedder() -> Result<Arc<dyn EmbeddingProvider>> {
    let service = tokio::task::spawn_blocking(EmbeddingService::new).await??;
    Ok(Arc::new(service))
}

/// The verified query library: a JSON catalog when given, PostgreSQL otherwise.
pub(crate) async fn open_library(
    catalog: Option<&Path>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
) -> Result<Arc<StorageBackend>> {
    let backend = match catalog {
        Some(path) => StorageBackend::new_memory(catalog::load(path, embedder).await?),
        None => {
            let url = get_database_url("SMART_QUERY_DATABASE_URL")?;
            StorageBackend::new_postgres(&url).await?
        },
    };
    tracing::info!(backend = backend.kind(), "verified query library opened");
    Ok(Arc::new(backend))
}
