//! PostgreSQL verified query library using sqlx and pgvector.
//!
//! Tables: `verified_query`, `question` (example questions with a
//! `vector_embedding` column) and `follow_up` (source → target links). Schema
//! management belongs to the curation tooling; this module only reads.

#![allow(clippy::absolute_paths, reason = "std paths in error handling are clear")]

use async_trait::async_trait;
use chrono::NaiveDateTime;
use smart_query_core::{
    ExampleMatch, ExampleQuestion, ExampleRecord, VerifiedQuery, PG_POOL_ACQUIRE_TIMEOUT_SECS,
    PG_POOL_IDLE_TIMEOUT_SECS, PG_POOL_MAX_CONNECTIONS,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::error::StorageError;
use crate::traits::{VectorSearch, VerifiedQueryStore};

#[derive(Clone, Debug)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(PG_POOL_MAX_CONNECTIONS)
            .acquire_timeout(std::time::Duration::from_secs(PG_POOL_ACQUIRE_TIMEOUT_SECS))
            .idle_timeout(std::time::Duration::from_secs(PG_POOL_IDLE_TIMEOUT_SECS))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;
        tracing::info!("PgStorage initialized");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn questions_for(&self, id: &str) -> Result<Vec<ExampleQuestion>, StorageError> {
        let rows = sqlx::query(
            "SELECT question_text, vector_embedding::text AS embedding
               FROM question
              WHERE verified_query_id = $1
              ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_example_question).collect()
    }

    async fn follow_ups_for(&self, id: &str) -> Result<Vec<String>, StorageError> {
        let ids = sqlx::query_scalar(
            "SELECT target_query_id FROM follow_up WHERE source_query_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

fn row_to_verified_query(row: &PgRow) -> Result<VerifiedQuery, StorageError> {
    let verified_at: NaiveDateTime = row.try_get("verified_at")?;
    let tables_used: Option<Vec<String>> = row.try_get("tables_used")?;
    Ok(VerifiedQuery {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        sql: row.try_get("sql")?,
        explanation: row.try_get("query_explanation")?,
        instructions: row.try_get("instructions")?,
        tables_used: tables_used.unwrap_or_default().into_iter().collect(),
        questions: Vec::new(),
        follow_ups: Vec::new(),
        verified_by: row.try_get("verified_by")?,
        verified_at: verified_at.and_utc(),
    })
}

fn row_to_example_question(row: &PgRow) -> Result<ExampleQuestion, StorageError> {
    let embedding: Option<String> = row.try_get("embedding")?;
    Ok(ExampleQuestion {
        text: row.try_get("question_text")?,
        embedding: embedding.as_deref().map(parse_vector_text).transpose()?,
    })
}

fn row_to_example_record(row: &PgRow) -> Result<ExampleRecord, StorageError> {
    let embedding: Option<String> = row.try_get("embedding")?;
    Ok(ExampleRecord {
        example_id: row.try_get("example_id")?,
        verified_query_id: row.try_get("verified_query_id")?,
        text: row.try_get("question_text")?,
        embedding: embedding.as_deref().map(parse_vector_text).transpose()?,
    })
}

fn row_to_example_match(row: &PgRow) -> Result<ExampleMatch, StorageError> {
    let distance: f64 = row.try_get("distance")?;
    #[expect(clippy::cast_possible_truncation, reason = "cosine distance is within 0..=2")]
    let distance = distance as f32;
    Ok(ExampleMatch {
        example_id: row.try_get("example_id")?,
        verified_query_id: row.try_get("verified_query_id")?,
        question_text: row.try_get("question_text")?,
        distance,
    })
}

/// Format an embedding as a pgvector literal (`[0.1,0.2,...]`).
pub(crate) fn vector_literal(embedding: &[f32]) -> String {
    format!("[{}]", embedding.iter().map(f32::to_string).collect::<Vec<_>>().join(","))
}

/// Parse pgvector text output back into floats.
pub(crate) fn parse_vector_text(text: &str) -> Result<Vec<f32>, StorageError> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| StorageError::corruption("pgvector literal", format!("not a vector: {text}")))?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|e| StorageError::corruption("pgvector component", e))
        })
        .collect()
}

#[async_trait]
impl VerifiedQueryStore for PgStorage {
    async fn get(&self, id: &str) -> Result<VerifiedQuery, StorageError> {
        let row = sqlx::query(
            "SELECT id, name, query_explanation, sql, instructions, tables_used,
                    verified_at, verified_by
               FROM verified_query
              WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::NotFound { entity: "verified_query", id: id.to_owned() })?;

        let mut vq = row_to_verified_query(&row)?;
        vq.questions = self.questions_for(id).await?;
        vq.follow_ups = self.follow_ups_for(id).await?;
        Ok(vq)
    }

    async fn all_examples(&self) -> Result<Vec<ExampleRecord>, StorageError> {
        let rows = sqlx::query(
            "SELECT id::text AS example_id, verified_query_id, question_text,
                    vector_embedding::text AS embedding
               FROM question
              ORDER BY verified_query_id, id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_example_record).collect()
    }
}

#[async_trait]
impl VectorSearch for PgStorage {
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<ExampleMatch>, StorageError> {
        if embedding.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let limit = i64::try_from(k).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            "SELECT q.id::text AS example_id, q.verified_query_id, q.question_text,
                    (q.vector_embedding <=> $1::vector)::float8 AS distance
               FROM question q
               JOIN verified_query vq ON vq.id = q.verified_query_id
              WHERE q.vector_embedding IS NOT NULL
              ORDER BY q.vector_embedding <=> $1::vector, vq.verified_at DESC
              LIMIT $2",
        )
        .bind(vector_literal(embedding))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_example_match).collect()
    }
}
