//! Storage layer for smart-query
//!
//! Read access to the verified query library (PostgreSQL with pgvector, or an
//! in-memory catalog) and execution of generated SQL against the business
//! database.

mod backend;
pub mod error;
mod executor;
mod memory;
mod pg_storage;
#[cfg(test)]
mod tests;
pub mod traits;

pub use backend::StorageBackend;
pub use error::{ExecutionError, StorageError};
pub use executor::PgExecutor;
pub use memory::MemoryStore;
pub use pg_storage::PgStorage;
pub use traits::{SqlExecutor, VectorSearch, VerifiedQueryStore};
