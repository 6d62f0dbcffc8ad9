//! In-memory verified query library.
//!
//! Readers clone an `Arc` to an immutable snapshot; writers build a new
//! snapshot and swap it in, so a reader never sees a half-updated record.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use smart_query_core::{cosine_distance, ExampleMatch, ExampleRecord, VerifiedQuery};

use crate::error::StorageError;
use crate::traits::{VectorSearch, VerifiedQueryStore};

#[derive(Debug, Default)]
struct Snapshot {
    queries: HashMap<String, Arc<VerifiedQuery>>,
    /// Insertion order of query ids, kept for deterministic example listing.
    order: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Arc<Snapshot>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_queries(queries: impl IntoIterator<Item = VerifiedQuery>) -> Self {
        let store = Self::new();
        for vq in queries {
            store.upsert(vq);
        }
        store
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Insert or replace a verified query.
    pub fn upsert(&self, vq: VerifiedQuery) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Snapshot {
            queries: guard.queries.clone(),
            order: guard.order.clone(),
        };
        if !next.queries.contains_key(&vq.id) {
            next.order.push(vq.id.clone());
        }
        next.queries.insert(vq.id.clone(), Arc::new(vq));
        *guard = Arc::new(next);
    }

    /// Remove a verified query. Returns whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if !guard.queries.contains_key(id) {
            return false;
        }
        let mut next = Snapshot {
            queries: guard.queries.clone(),
            order: guard.order.clone(),
        };
        next.queries.remove(id);
        next.order.retain(|existing| existing != id);
        *guard = Arc::new(next);
        true
    }

    pub fn len(&self) -> usize {
        self.snapshot().queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn example_id(query_id: &str, index: usize) -> String {
    format!("{query_id}#{index}")
}

#[async_trait]
impl VerifiedQueryStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<VerifiedQuery, StorageError> {
        self.snapshot()
            .queries
            .get(id)
            .map(|vq| VerifiedQuery::clone(vq))
            .ok_or_else(|| StorageError::NotFound { entity: "verified_query", id: id.to_owned() })
    }

    async fn all_examples(&self) -> Result<Vec<ExampleRecord>, StorageError> {
        let snapshot = self.snapshot();
        let records = snapshot
            .order
            .iter()
            .filter_map(|id| snapshot.queries.get(id))
            .flat_map(|vq| {
                vq.questions.iter().enumerate().map(move |(i, q)| ExampleRecord {
                    example_id: example_id(&vq.id, i),
                    verified_query_id: vq.id.clone(),
                    text: q.text.clone(),
                    embedding: q.embedding.clone(),
                })
            })
            .collect();
        Ok(records)
    }
}

#[async_trait]
impl VectorSearch for MemoryStore {
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<ExampleMatch>, StorageError> {
        if embedding.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let snapshot = self.snapshot();
        let mut matches: Vec<(DateTime<Utc>, ExampleMatch)> = snapshot
            .order
            .iter()
            .filter_map(|id| snapshot.queries.get(id))
            .flat_map(|vq| {
                vq.questions.iter().enumerate().filter_map(move |(i, q)| {
                    let distance = cosine_distance(embedding, q.embedding.as_deref()?)?;
                    let hit = ExampleMatch {
                        example_id: example_id(&vq.id, i),
                        verified_query_id: vq.id.clone(),
                        question_text: q.text.clone(),
                        distance,
                    };
                    Some((vq.verified_at, hit))
                })
            })
            .collect();
        // Equal distances go to the newest verified query before the cut to K.
        matches.sort_by(|(a_at, a), (b_at, b)| {
            a.distance.total_cmp(&b.distance).then_with(|| b_at.cmp(a_at))
        });
        matches.truncate(k);
        Ok(matches.into_iter().map(|(_, hit)| hit).collect())
    }
}
