//! Business-database SQL execution.
//!
//! Each execution acquires one pooled connection and releases it on return.
//! Values are normalised to JSON: numerics become numbers, temporal types ISO
//! 8601 strings, and anything unrecognised is decoded as text or `null`.

#![allow(clippy::absolute_paths, reason = "std paths in error handling are clear")]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures_util::TryStreamExt;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use smart_query_core::{
    QueryResults, DEFAULT_MAX_RESULT_ROWS, PG_POOL_ACQUIRE_TIMEOUT_SECS, PG_POOL_IDLE_TIMEOUT_SECS,
    PG_POOL_MAX_CONNECTIONS,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, Executor, PgPool, Row, TypeInfo};

use crate::error::ExecutionError;
use crate::traits::SqlExecutor;

#[derive(Clone, Debug)]
pub struct PgExecutor {
    pool: PgPool,
    max_rows: usize,
}

impl PgExecutor {
    pub async fn new(database_url: &str, max_rows: usize) -> Result<Self, ExecutionError> {
        let pool = PgPoolOptions::new()
            .max_connections(PG_POOL_MAX_CONNECTIONS)
            .acquire_timeout(std::time::Duration::from_secs(PG_POOL_ACQUIRE_TIMEOUT_SECS))
            .idle_timeout(std::time::Duration::from_secs(PG_POOL_IDLE_TIMEOUT_SECS))
            .connect(database_url)
            .await
            .map_err(ExecutionError::Unavailable)?;
        tracing::info!(max_rows, "PgExecutor initialized");
        Ok(Self { pool, max_rows })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool, max_rows: DEFAULT_MAX_RESULT_ROWS }
    }

    #[must_use]
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows.max(1);
        self
    }
}

#[async_trait]
impl SqlExecutor for PgExecutor {
    async fn execute(&self, sql: &str) -> Result<QueryResults, ExecutionError> {
        let mut conn = self.pool.acquire().await.map_err(ExecutionError::Unavailable)?;

        let mut rows: Vec<PgRow> = Vec::new();
        let mut truncated = false;
        {
            let mut stream = sqlx::query(sql).fetch(&mut *conn);
            while let Some(row) = stream.try_next().await? {
                if rows.len() == self.max_rows {
                    truncated = true;
                    break;
                }
                rows.push(row);
            }
        }

        let columns: Vec<String> = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_owned()).collect(),
            None => match (&mut *conn).describe(sql).await {
                Ok(described) => described.columns().iter().map(|c| c.name().to_owned()).collect(),
                Err(e) => {
                    tracing::debug!(error = %e, "could not describe empty result set");
                    Vec::new()
                },
            },
        };

        let rows = rows.iter().map(row_to_json).collect();
        if truncated {
            tracing::warn!(max_rows = self.max_rows, "result set truncated");
        }
        Ok(QueryResults { columns, rows, truncated })
    }
}

fn row_to_json(row: &PgRow) -> Map<String, Value> {
    row.columns()
        .iter()
        .map(|column| {
            let value = decode_column(row, column.ordinal(), column.type_info().name());
            (column.name().to_owned(), value)
        })
        .collect()
}

fn decode_column(row: &PgRow, index: usize, type_name: &str) -> Value {
    let decoded = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index).map(|v| v.map(Value::Bool)),
        "INT2" => row.try_get::<Option<i16>, _>(index).map(|v| v.map(Value::from)),
        "INT4" => row.try_get::<Option<i32>, _>(index).map(|v| v.map(Value::from)),
        "INT8" => row.try_get::<Option<i64>, _>(index).map(|v| v.map(Value::from)),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)
            .map(|v| v.map(|f| float_to_json(f64::from(f)))),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index).map(|v| v.map(float_to_json)),
        "NUMERIC" => row.try_get::<Option<Decimal>, _>(index).map(|v| v.map(decimal_to_json)),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)
            .map(|v| v.map(|ts| Value::String(ts.to_rfc3339()))),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)
            .map(|v| v.map(|ts| Value::String(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(index)
            .map(|v| v.map(|d| Value::String(d.format("%Y-%m-%d").to_string()))),
        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(index)
            .map(|v| v.map(|t| Value::String(t.format("%H:%M:%S%.f").to_string()))),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(index)
            .map(|v| v.map(|u| Value::String(u.to_string()))),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(index),
        "TEXT[]" | "VARCHAR[]" => row
            .try_get::<Option<Vec<String>>, _>(index)
            .map(|v| v.map(|items| Value::Array(items.into_iter().map(Value::String).collect()))),
        _ => row.try_get::<Option<String>, _>(index).map(|v| v.map(Value::String)),
    };
    match decoded {
        Ok(value) => value.unwrap_or(Value::Null),
        Err(e) => {
            tracing::debug!(column = index, type_name, error = %e, "undecodable column, using null");
            Value::Null
        },
    }
}

/// Non-finite floats have no JSON representation and become `null`.
pub(crate) fn float_to_json(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

pub(crate) fn decimal_to_json(value: Decimal) -> Value {
    if value.scale() == 0 {
        if let Some(int) = value.to_i64() {
            return Value::from(int);
        }
    }
    value.to_f64().map_or(Value::Null, float_to_json)
}
