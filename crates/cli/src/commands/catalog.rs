//! JSON catalog of verified queries.
//!
//! The file holds an array of verified queries. Example embeddings in the file
//! are replaced at load time so they always match the current texts and model.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use smart_query_core::VerifiedQuery;
use smart_query_embeddings::EmbeddingProvider;
use smart_query_storage::MemoryStore;

pub(crate) async fn load(
    path: &Path,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
) -> Result<MemoryStore> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading catalog {}", path.display()))?;
    let mut queries = parse(&raw).with_context(|| format!("parsing catalog {}", path.display()))?;

    if let Some(embedder) = embedder {
        queries = tokio::task::spawn_blocking(move || embed_examples(queries, embedder.as_ref()))
            .await??;
    }

    let examples: usize = queries.iter().map(|q| q.questions.len()).sum();
    tracing::info!(path = %path.display(), queries = queries.len(), examples, "catalog loaded");
    Ok(MemoryStore::from_queries(queries))
}

fn parse(raw: &str) -> Result<Vec<VerifiedQuery>> {
    let queries: Vec<VerifiedQuery> = serde_json::from_str(raw)?;
    let mut seen = HashSet::new();
    for vq in &queries {
        if !seen.insert(vq.id.as_str()) {
            bail!("duplicate verified query id {:?}", vq.id);
        }
    }
    Ok(queries)
}

fn embed_examples(
    mut queries: Vec<VerifiedQuery>,
    embedder: &dyn EmbeddingProvider,
) -> Result<Vec<VerifiedQuery>> {
    for vq in &mut queries {
        let texts: Vec<String> = vq.example_texts().map(str::to_owned).collect();
        if texts.is_empty() {
            continue;
        }
        let vectors = embedder.embed_batch(&texts)?;
        if vectors.len() != texts.len() {
            bail!("embedder returned {} vectors for {} examples of {}", vectors.len(), texts.len(), vq.id);
        }
        for (question, vector) in vq.questions.iter_mut().zip(vectors) {
            question.embedding = Some(vector);
        }
    }
    Ok(queries)
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use smart_query_embeddings::EmbeddingError;
    use smart_query_storage::VerifiedQueryStore;

    use super::*;

    struct LengthEmbedder;

    impl EmbeddingProvider for LengthEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    const CATALOG: &str = r#"[
        {
            "id": "q1",
            "name": "Total premiums",
            "sql": "SELECT SUM(amount) AS total FROM premiums",
            "explanation": "Sum of written premiums",
            "questions": [
                {"text": "total premiums", "embedding": [9.0, 9.0]},
                {"text": "premium volume"}
            ],
            "follow_ups": ["q2"],
            "verified_by": "analyst",
            "verified_at": "2025-01-10T09:00:00Z"
        },
        {
            "id": "q2",
            "name": "Claims by region",
            "sql": "SELECT region, COUNT(*) FROM claims GROUP BY region",
            "query_explanation": "Claim counts per region",
            "verified_by": "analyst",
            "verified_at": "2025-01-11T09:00:00Z"
        }
    ]"#;

    fn write_catalog(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_embeds_every_example() {
        let file = write_catalog(CATALOG);
        let store = load(file.path(), Some(Arc::new(LengthEmbedder))).await.unwrap();
        assert_eq!(store.len(), 2);

        let examples = store.all_examples().await.unwrap();
        assert_eq!(examples.len(), 2);
        let stale = examples.iter().find(|e| e.text == "total premiums").unwrap();
        assert_eq!(stale.embedding.as_deref(), Some(&[14.0, 1.0][..]));
        assert!(examples.iter().all(|e| e.embedding.is_some()));
    }

    #[tokio::test]
    async fn test_load_without_embedder_keeps_file_vectors() {
        let file = write_catalog(CATALOG);
        let store = load(file.path(), None).await.unwrap();
        let examples = store.all_examples().await.unwrap();
        let missing = examples.iter().filter(|e| e.embedding.is_none()).count();
        assert_eq!(missing, 1);
        assert_eq!(store.get("q2").await.unwrap().explanation, "Claim counts per region");
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let one = r#"{"id": "q1", "name": "a", "sql": "SELECT 1", "explanation": "x",
            "verified_by": "analyst", "verified_at": "2025-01-10T09:00:00Z"}"#;
        let err = parse(&format!("[{one}, {one}]")).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[tokio::test]
    async fn test_missing_file_names_path() {
        let err = load(Path::new("/nonexistent/catalog.json"), None).await.unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/catalog.json"));
    }
}
