//! Session protocol: actions sent by the client and events emitted back.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::adaptation::{Modification, ReviewResult};
use crate::verified_query::MatchedQuerySummary;

/// Pipeline stage of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    AwaitingClarification,
    MatchingQuery,
    Recommending,
    Modifying,
    Reviewing,
    Executing,
    PlanningFollowUps,
    Stopped,
    Failed,
}

impl PipelineStage {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingClarification => "awaiting_clarification",
            Self::MatchingQuery => "matching_query",
            Self::Recommending => "recommending",
            Self::Modifying => "modifying",
            Self::Reviewing => "reviewing",
            Self::Executing => "executing",
            Self::PlanningFollowUps => "planning_follow_ups",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a turn-ending failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Clarification,
    Matching,
    Adaptation,
    Execution,
    FollowUp,
    InvalidInput,
}

impl FailureKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Clarification => "clarification",
            Self::Matching => "matching",
            Self::Adaptation => "adaptation",
            Self::Execution => "execution",
            Self::FollowUp => "follow_up",
            Self::InvalidInput => "invalid_input",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One disambiguating rephrasing offered to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clarification {
    pub text: String,
    #[serde(default, alias = "rationale")]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpSuggestion {
    pub source_query_id: String,
    pub question: String,
}

/// Row set returned by the business database, rows keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResults {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    #[serde(default)]
    pub truncated: bool,
}

impl QueryResults {
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Message from the client to its session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientAction {
    Ask {
        question: String,
        #[serde(default = "default_clarify")]
        clarify: bool,
    },
    SelectClarification {
        selected_question: String,
        original_question: String,
    },
    Stop,
    Reset,
}

const fn default_clarify() -> bool {
    true
}

/// Ordered notification from a session to its observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SessionEvent {
    Progress {
        stage: PipelineStage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        iteration: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_iterations: Option<u32>,
    },
    IntentClarifications {
        original_question: String,
        clarifications: Vec<Clarification>,
    },
    BestQuery {
        query: MatchedQuerySummary,
        matched_question: String,
        distance: f32,
        confidence: f32,
        reasoning: String,
    },
    NoMatch {
        question: String,
        message: String,
    },
    Recommendations {
        enhanced_question: String,
        modifications: Vec<Modification>,
        explanation: String,
    },
    ModifiedSql {
        sql: String,
        explanation: String,
    },
    ReviewStatus {
        iteration: u32,
        max_iterations: u32,
        message: String,
    },
    ReviewFindings {
        iteration: u32,
        review: ReviewResult,
    },
    FinalSql {
        sql: String,
        review_applied: bool,
        max_iterations_reached: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        residual_concerns: Option<String>,
    },
    QueryResults {
        #[serde(flatten)]
        results: QueryResults,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        narrative: Option<String>,
    },
    FollowUps {
        suggestions: Vec<FollowUpSuggestion>,
    },
    TurnCompleted {},
    Error {
        stage: PipelineStage,
        kind: FailureKind,
        message: String,
    },
    Stopped {
        stage: PipelineStage,
    },
}

impl SessionEvent {
    #[must_use]
    pub const fn progress(stage: PipelineStage) -> Self {
        Self::Progress { stage, iteration: None, max_iterations: None }
    }

    #[must_use]
    pub const fn progress_iteration(stage: PipelineStage, iteration: u32, max_iterations: u32) -> Self {
        Self::Progress { stage, iteration: Some(iteration), max_iterations: Some(max_iterations) }
    }

    /// Wire name of the event (`step` tag).
    #[must_use]
    pub const fn step(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::IntentClarifications { .. } => "intent_clarifications",
            Self::BestQuery { .. } => "best_query",
            Self::NoMatch { .. } => "no_match",
            Self::Recommendations { .. } => "recommendations",
            Self::ModifiedSql { .. } => "modified_sql",
            Self::ReviewStatus { .. } => "review_status",
            Self::ReviewFindings { .. } => "review_findings",
            Self::FinalSql { .. } => "final_sql",
            Self::QueryResults { .. } => "query_results",
            Self::FollowUps { .. } => "follow_ups",
            Self::TurnCompleted {} => "turn_completed",
            Self::Error { .. } => "error",
            Self::Stopped { .. } => "stopped",
        }
    }

    /// True for events after which the session is idle again.
    #[must_use]
    pub const fn ends_turn(&self) -> bool {
        matches!(self, Self::TurnCompleted {} | Self::Error { .. } | Self::Stopped { .. })
    }
}
