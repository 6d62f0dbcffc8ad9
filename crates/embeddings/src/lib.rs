//! Embedding generation for verified query matching
//!
//! Example questions and incoming questions are embedded with the same model
//! so their cosine distance is meaningful. Inference is CPU-bound and
//! synchronous; async callers should run it on the blocking pool.

mod error;

use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use smart_query_core::EMBEDDING_DIMENSION;

pub use error::EmbeddingError;

/// Turns text into a fixed-dimension vector.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed several texts at once. The default embeds one by one.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize;
}

/// Local BGE-M3 model (1024d, multilingual).
pub struct EmbeddingService {
    model: Mutex<TextEmbedding>,
}

impl std::fmt::Debug for EmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingService").field("dimension", &EMBEDDING_DIMENSION).finish()
    }
}

impl EmbeddingService {
    /// Load the model, downloading it into the fastembed cache on first use.
    pub fn new() -> Result<Self, EmbeddingError> {
        tracing::info!("Initializing embedding model (BGE-M3)...");
        let options = InitOptions::new(EmbeddingModel::BGEM3).with_show_download_progress(false);
        let model =
            TextEmbedding::try_new(options).map_err(|e| EmbeddingError::ModelInit(e.to_string()))?;
        tracing::info!("Embedding model initialized");
        Ok(Self { model: Mutex::new(model) })
    }

    fn run(&self, texts: Vec<&str>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let expected = texts.len();
        let mut model = self.model.lock().map_err(|_| EmbeddingError::LockPoisoned)?;
        let embeddings =
            model.embed(texts, None).map_err(|e| EmbeddingError::Generation(e.to_string()))?;
        if embeddings.len() != expected {
            return Err(EmbeddingError::EmptyResult);
        }
        for embedding in &embeddings {
            check_dimension(embedding)?;
        }
        Ok(embeddings)
    }
}

fn check_dimension(embedding: &[f32]) -> Result<(), EmbeddingError> {
    if embedding.len() == EMBEDDING_DIMENSION {
        Ok(())
    } else {
        Err(EmbeddingError::DimensionMismatch {
            expected: EMBEDDING_DIMENSION,
            actual: embedding.len(),
        })
    }
}

impl EmbeddingProvider for EmbeddingService {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.run(vec![text])?.into_iter().next().ok_or(EmbeddingError::EmptyResult)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run(texts.iter().map(String::as_str).collect())
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }
}
