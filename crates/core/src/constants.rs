//! Shared constants for smart-query.

/// PostgreSQL connection pool: maximum connections.
pub const PG_POOL_MAX_CONNECTIONS: u32 = 20;

/// PostgreSQL connection pool: acquire timeout in seconds.
pub const PG_POOL_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// PostgreSQL connection pool: idle timeout in seconds.
pub const PG_POOL_IDLE_TIMEOUT_SECS: u64 = 300;

/// Embedding vector dimension (BGE-M3 model: 1024d, 100+ languages).
pub const EMBEDDING_DIMENSION: usize = 1024;

/// Number of verified-query candidates retrieved by vector search.
pub const DEFAULT_TOP_K: usize = 5;

/// Upper bound for the configurable candidate count.
pub const MAX_TOP_K: usize = 50;

/// Review iterations allowed per turn when not configured.
pub const DEFAULT_MAX_REVIEW_ITERATIONS: u32 = 2;

/// Upper bound for the configurable review iteration count.
pub const MAX_REVIEW_ITERATIONS_LIMIT: u32 = 10;

/// Cosine distance spans `0.0..=2.0`, so this default keeps every candidate.
pub const DEFAULT_MATCH_MAX_DISTANCE: f32 = 2.0;

/// Rows forwarded to the observer per execution (DoS protection).
pub const DEFAULT_MAX_RESULT_ROWS: usize = 1000;

/// Buffered actions/events per session channel.
pub const SESSION_CHANNEL_CAPACITY: usize = 64;

/// Maximum length of a question accepted from a client.
pub const MAX_QUESTION_LENGTH: usize = 2000;
