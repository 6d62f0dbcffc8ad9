//! Per-session conversation state.

use std::sync::Arc;

use smart_query_core::{Clarification, Modification, PipelineStage, VerifiedQuery};

/// Where the current turn is, carrying only that stage's data.
#[derive(Debug, Clone, Default)]
pub(crate) enum Stage {
    #[default]
    Idle,
    AwaitingClarification {
        options: Vec<Clarification>,
    },
    MatchingQuery,
    Recommending {
        query: Arc<VerifiedQuery>,
    },
    Modifying {
        query: Arc<VerifiedQuery>,
        modifications: Vec<Modification>,
    },
    Reviewing {
        query: Arc<VerifiedQuery>,
        iteration: u32,
        max_iterations: u32,
        candidate_sql: String,
    },
    Executing {
        query: Arc<VerifiedQuery>,
        final_sql: String,
    },
    PlanningFollowUps {
        query: Arc<VerifiedQuery>,
        final_sql: String,
    },
    Stopped {
        at: PipelineStage,
    },
    Failed {
        at: PipelineStage,
    },
}

impl Stage {
    pub(crate) const fn kind(&self) -> PipelineStage {
        match self {
            Self::Idle => PipelineStage::Idle,
            Self::AwaitingClarification { .. } => PipelineStage::AwaitingClarification,
            Self::MatchingQuery => PipelineStage::MatchingQuery,
            Self::Recommending { .. } => PipelineStage::Recommending,
            Self::Modifying { .. } => PipelineStage::Modifying,
            Self::Reviewing { .. } => PipelineStage::Reviewing,
            Self::Executing { .. } => PipelineStage::Executing,
            Self::PlanningFollowUps { .. } => PipelineStage::PlanningFollowUps,
            Self::Stopped { .. } => PipelineStage::Stopped,
            Self::Failed { .. } => PipelineStage::Failed,
        }
    }

    /// `(iteration, max)` for the review stage.
    pub(crate) const fn iteration(&self) -> Option<(u32, u32)> {
        match self {
            Self::Reviewing { iteration, max_iterations, .. } => Some((*iteration, *max_iterations)),
            _ => None,
        }
    }
}

/// Owned by exactly one session task; reset at every top-level question.
#[derive(Debug, Default)]
pub(crate) struct ConversationState {
    pub question: String,
    pub enhanced_question: Option<String>,
    pub stage: Stage,
}

impl ConversationState {
    pub(crate) fn new(question: String) -> Self {
        Self { question, enhanced_question: None, stage: Stage::Idle }
    }

    /// Question the pipeline works on: the chosen rephrasing if any.
    pub(crate) fn working_question(&self) -> &str {
        self.enhanced_question.as_deref().unwrap_or(&self.question)
    }

    pub(crate) const fn is_awaiting_clarification(&self) -> bool {
        matches!(self.stage, Stage::AwaitingClarification { .. })
    }

    /// One-line summary fed to the next turn's prompts.
    pub(crate) fn summary(&self) -> Option<String> {
        let (Stage::PlanningFollowUps { query, final_sql } | Stage::Executing { query, final_sql }) = &self.stage
        else {
            return None;
        };
        Some(format!(
            "The user asked \"{}\" and it was answered with the verified query \"{}\" using: {}",
            self.working_question(),
            query.name,
            smart_query_llm::truncate(final_sql, 400),
        ))
    }
}
