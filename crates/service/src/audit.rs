//! Integrity check of the verified query library.

use std::collections::BTreeSet;

use serde::Serialize;
use smart_query_storage::VerifiedQueryStore;

use crate::ServiceError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingFollowUp {
    pub query_id: String,
    pub missing_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrongDimension {
    pub example_id: String,
    pub actual: usize,
}

/// Findings of [`audit_catalog`]. Queries without any example question are
/// invisible to matching and therefore not counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogReport {
    pub queries: usize,
    pub examples: usize,
    pub dangling_follow_ups: Vec<DanglingFollowUp>,
    pub missing_embeddings: Vec<String>,
    pub wrong_dimension: Vec<WrongDimension>,
}

impl CatalogReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.dangling_follow_ups.is_empty()
            && self.missing_embeddings.is_empty()
            && self.wrong_dimension.is_empty()
    }
}

pub async fn audit_catalog(
    store: &dyn VerifiedQueryStore,
    dimension: usize,
) -> Result<CatalogReport, ServiceError> {
    let examples = store.all_examples().await?;
    let mut report = CatalogReport { examples: examples.len(), ..CatalogReport::default() };

    let mut query_ids = BTreeSet::new();
    for example in &examples {
        query_ids.insert(example.verified_query_id.as_str());
        match &example.embedding {
            None => report.missing_embeddings.push(example.example_id.clone()),
            Some(v) if v.len() != dimension => report
                .wrong_dimension
                .push(WrongDimension { example_id: example.example_id.clone(), actual: v.len() }),
            Some(_) => {},
        }
    }
    report.queries = query_ids.len();

    for id in query_ids {
        let query = store.get(id).await?;
        for follow_up in &query.follow_ups {
            match store.get(follow_up).await {
                Ok(_) => {},
                Err(e) if e.is_not_found() => report.dangling_follow_ups.push(DanglingFollowUp {
                    query_id: query.id.clone(),
                    missing_id: follow_up.clone(),
                }),
                Err(e) => return Err(e.into()),
            }
        }
    }

    tracing::info!(
        queries = report.queries,
        examples = report.examples,
        dangling = report.dangling_follow_ups.len(),
        missing_embeddings = report.missing_embeddings.len(),
        wrong_dimension = report.wrong_dimension.len(),
        "catalog audit finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use smart_query_core::ExampleQuestion;
    use smart_query_storage::MemoryStore;

    use super::*;
    use crate::test_support::{make_query, reporting_catalog};

    #[tokio::test]
    async fn test_reporting_catalog_is_clean() {
        let report = audit_catalog(&reporting_catalog(), 3).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.queries, 4);
        assert_eq!(report.examples, 4);
    }

    #[tokio::test]
    async fn test_findings() {
        let mut q1 = make_query("q1", "Premiums", "SELECT 1", &[("premiums", [1.0, 0.0, 0.0])], &["q2", "gone"]);
        q1.questions.push(ExampleQuestion::new("premium total"));
        let mut q2 = make_query("q2", "Claims", "SELECT 2", &[], &[]);
        q2.questions.push(ExampleQuestion::new("claims").with_embedding(vec![1.0; 5]));
        let store = MemoryStore::from_queries([q1, q2]);

        let report = audit_catalog(&store, 3).await.unwrap();
        assert!(!report.is_clean());
        assert_eq!(
            report.dangling_follow_ups,
            [DanglingFollowUp { query_id: "q1".to_owned(), missing_id: "gone".to_owned() }]
        );
        assert_eq!(report.missing_embeddings, ["q1#1"]);
        assert_eq!(report.wrong_dimension, [WrongDimension { example_id: "q2#0".to_owned(), actual: 5 }]);
    }
}
