//! Conversation orchestrator.
//!
//! Every session is one tokio task with an inbox of [`ClientAction`]s and an
//! outbox of [`SessionEvent`]s. Steps inside a session run strictly in order;
//! sessions only share the read-mostly library, the LLM client and the
//! business connection pool.

mod session;
mod state;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use smart_query_core::{ClientAction, SessionEvent, SESSION_CHANNEL_CAPACITY};
use smart_query_embeddings::EmbeddingProvider;
use smart_query_llm::CompletionProvider;
use smart_query_storage::{SqlExecutor, VectorSearch, VerifiedQueryStore};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument as _;

use crate::adaptation::QueryAdaptationEngine;
use crate::clarification::ClarificationResolver;
use crate::config::PipelineConfig;
use crate::follow_up::FollowUpPlanner;
use crate::matcher::VerifiedQueryMatcher;
use crate::narrator::AnswerNarrator;
use crate::ServiceError;

use self::session::Session;

/// External capabilities the pipeline runs on.
pub struct Collaborators {
    pub llm: Arc<dyn CompletionProvider>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub store: Arc<dyn VerifiedQueryStore>,
    pub search: Arc<dyn VectorSearch>,
    pub executor: Arc<dyn SqlExecutor>,
}

/// Stage handlers shared by every session.
pub(crate) struct Pipeline {
    pub resolver: ClarificationResolver,
    pub matcher: VerifiedQueryMatcher,
    pub adapter: QueryAdaptationEngine,
    pub executor: Arc<dyn SqlExecutor>,
    pub narrator: Option<AnswerNarrator>,
    pub planner: FollowUpPlanner,
    pub config: PipelineConfig,
}

pub struct ConversationService {
    pipeline: Arc<Pipeline>,
    next_session: AtomicU64,
}

impl ConversationService {
    #[must_use]
    pub fn new(collaborators: Collaborators, config: PipelineConfig) -> Self {
        let Collaborators { llm, embedder, store, search, executor } = collaborators;
        let pipeline = Pipeline {
            resolver: ClarificationResolver::new(Arc::clone(&llm)),
            matcher: VerifiedQueryMatcher::new(
                Arc::clone(&llm),
                embedder,
                Arc::clone(&store),
                search,
                config.top_k,
                config.match_max_distance,
            ),
            adapter: QueryAdaptationEngine::new(Arc::clone(&llm)),
            executor,
            narrator: config.narrative.then(|| AnswerNarrator::new(Arc::clone(&llm))),
            planner: FollowUpPlanner::new(llm, store),
            config,
        };
        Self { pipeline: Arc::new(pipeline), next_session: AtomicU64::new(1) }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.pipeline.config
    }

    /// Start a session task. Must be called from within a tokio runtime.
    ///
    /// The session ends once every action sender is dropped and the queued
    /// actions are handled, or when the event receiver is dropped.
    #[must_use]
    pub fn open_session(&self) -> SessionHandle {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let (action_tx, action_rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        let session = Session::new(Arc::clone(&self.pipeline), action_rx, event_tx);
        let task = tokio::spawn(session.run().instrument(tracing::info_span!("session", session = id)));
        SessionHandle { id, actions: action_tx, events: event_rx, task }
    }
}

/// Client side of one session.
pub struct SessionHandle {
    pub id: u64,
    pub actions: mpsc::Sender<ClientAction>,
    pub events: mpsc::Receiver<SessionEvent>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub async fn send(&self, action: ClientAction) -> Result<(), ServiceError> {
        self.actions.send(action).await.map_err(|_| ServiceError::SessionClosed)
    }

    /// Next event in pipeline order; `None` once the session has ended.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Stop accepting actions, let queued work finish and wait for the task.
    pub async fn close(mut self) {
        drop(self.actions);
        while self.events.recv().await.is_some() {}
        if let Err(e) = self.task.await {
            tracing::warn!(session = self.id, error = %e, "session task ended abnormally");
        }
    }
}
