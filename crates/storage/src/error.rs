//! Typed errors for the storage layer.
//!
//! Library reads and business-query execution fail in different ways and are
//! reported to different pipeline stages, so they get separate enums.

use thiserror::Error;

/// Verified query library error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Row not found for expected-present entity.
    #[error("not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    /// SQL / connection / timeout failure.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Row data could not be deserialized into domain type.
    #[error("data corruption: {context}")]
    DataCorruption {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StorageError {
    /// Whether this error is likely transient (worth retrying).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Database(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) fn corruption(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::DataCorruption { context: context.into(), source: source.into() }
    }
}

/// Custom `From<sqlx::Error>`, NOT blanket `#[from]`.
///
/// - `RowNotFound` → `NotFound` (generic; callers should remap with entity context)
/// - Everything else → `Database`
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound { entity: "row", id: "unknown".into() },
            _ => Self::Database(err),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::corruption("JSON serialization/deserialization", err)
    }
}

/// Business-database execution error.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The database rejected the statement. `message` is the server's own text.
    #[error("SQL error: {message}")]
    Sql { message: String },

    /// Pool exhausted, connection refused or dropped mid-query.
    #[error("business database unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),
}

impl ExecutionError {
    /// Message safe to show verbatim to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Sql { message } => message.clone(),
            Self::Unavailable(_) => "The database is currently unavailable".to_owned(),
        }
    }
}

impl From<sqlx::Error> for ExecutionError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => Self::Sql { message: db_err.message().to_owned() },
            sqlx::Error::ColumnDecode { index, source } => {
                Self::Sql { message: format!("could not decode column {index}: {source}") }
            },
            other => Self::Unavailable(other),
        }
    }
}
