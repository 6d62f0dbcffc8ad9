//! Conversation pipeline for smart-query
//!
//! Turns a question into executed, reviewed SQL by adapting a verified query
//! template, and drives one ordered event stream per conversation session.

#![allow(missing_docs, reason = "Internal crate with self-explanatory API")]
#![allow(clippy::missing_errors_doc, reason = "Errors are self-explanatory from Result types")]
#![allow(missing_debug_implementations, reason = "Internal types")]
#![allow(clippy::implicit_return, reason = "Implicit return is idiomatic Rust")]
#![allow(clippy::question_mark_used, reason = "? operator is idiomatic Rust")]
#![allow(clippy::cognitive_complexity, reason = "Complex async flows are inherent")]

mod adaptation;
mod audit;
mod clarification;
mod config;
mod error;
mod follow_up;
mod matcher;
mod narrator;
mod orchestrator;
mod review;
#[cfg(test)]
mod test_support;

pub use adaptation::QueryAdaptationEngine;
pub use audit::{audit_catalog, CatalogReport, DanglingFollowUp, WrongDimension};
pub use clarification::{ClarificationOutcome, ClarificationResolver};
pub use config::PipelineConfig;
pub use error::ServiceError;
pub use follow_up::FollowUpPlanner;
pub use matcher::{Candidate, MatchOutcome, MatchedQuery, VerifiedQueryMatcher};
pub use narrator::AnswerNarrator;
pub use orchestrator::{Collaborators, ConversationService, SessionHandle};
pub use review::{review_decision, FinalSql, ReviewDecision};
