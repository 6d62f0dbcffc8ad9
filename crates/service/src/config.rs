//! Pipeline tuning read from the environment.

use smart_query_core::{
    env_flag, env_parse_with_default, DEFAULT_MATCH_MAX_DISTANCE, DEFAULT_MAX_RESULT_ROWS,
    DEFAULT_MAX_REVIEW_ITERATIONS, DEFAULT_TOP_K, MAX_REVIEW_ITERATIONS_LIMIT, MAX_TOP_K,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Vector search candidates per question (K).
    pub top_k: usize,
    /// Review passes per turn (N).
    pub max_review_iterations: u32,
    /// Review the verified SQL even when no modification was recommended.
    pub review_unmodified: bool,
    /// Candidates farther than this cosine distance never reach selection.
    pub match_max_distance: f32,
    /// Write a short conversational answer after execution.
    pub narrative: bool,
    pub max_result_rows: usize,
    pub user_profile: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_review_iterations: DEFAULT_MAX_REVIEW_ITERATIONS,
            review_unmodified: false,
            match_max_distance: DEFAULT_MATCH_MAX_DISTANCE,
            narrative: true,
            max_result_rows: DEFAULT_MAX_RESULT_ROWS,
            user_profile: None,
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let raw_top_k = env_parse_with_default("SMART_QUERY_TOP_K", DEFAULT_TOP_K);
        let raw_iterations =
            env_parse_with_default("SMART_QUERY_MAX_REVIEW_ITERATIONS", DEFAULT_MAX_REVIEW_ITERATIONS);
        let raw_distance =
            env_parse_with_default("SMART_QUERY_MATCH_MAX_DISTANCE", DEFAULT_MATCH_MAX_DISTANCE);
        let match_max_distance = if raw_distance.is_finite() && raw_distance >= 0.0 {
            raw_distance
        } else {
            tracing::warn!(
                value = raw_distance,
                "SMART_QUERY_MATCH_MAX_DISTANCE must be a non-negative number, using default"
            );
            DEFAULT_MATCH_MAX_DISTANCE
        };
        let user_profile = std::env::var("SMART_QUERY_USER_PROFILE")
            .ok()
            .map(|p| p.trim().to_owned())
            .filter(|p| !p.is_empty());

        Self {
            top_k: 0,
            max_review_iterations: 0,
            review_unmodified: env_flag("SMART_QUERY_REVIEW_UNMODIFIED", false),
            match_max_distance,
            narrative: env_flag("SMART_QUERY_NARRATIVE", true),
            max_result_rows: env_parse_with_default("SMART_QUERY_MAX_RESULT_ROWS", DEFAULT_MAX_RESULT_ROWS)
                .max(1),
            user_profile,
        }
        .with_top_k(raw_top_k)
        .with_max_review_iterations(raw_iterations)
    }

    /// Clamped to `1..=MAX_TOP_K`.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.clamp(1, MAX_TOP_K);
        if self.top_k != top_k {
            tracing::warn!(original = top_k, clamped = self.top_k, "top_k clamped to [1, {MAX_TOP_K}]");
        }
        self
    }

    /// Clamped to `1..=MAX_REVIEW_ITERATIONS_LIMIT`.
    #[must_use]
    pub fn with_max_review_iterations(mut self, iterations: u32) -> Self {
        self.max_review_iterations = iterations.clamp(1, MAX_REVIEW_ITERATIONS_LIMIT);
        if self.max_review_iterations != iterations {
            tracing::warn!(
                original = iterations,
                clamped = self.max_review_iterations,
                "max_review_iterations clamped to [1, {MAX_REVIEW_ITERATIONS_LIMIT}]"
            );
        }
        self
    }

    #[must_use]
    pub const fn with_review_unmodified(mut self, enabled: bool) -> Self {
        self.review_unmodified = enabled;
        self
    }

    #[must_use]
    pub const fn with_narrative(mut self, enabled: bool) -> Self {
        self.narrative = enabled;
        self
    }

    #[must_use]
    pub fn with_user_profile(mut self, profile: Option<String>) -> Self {
        self.user_profile = profile;
        self
    }
}
