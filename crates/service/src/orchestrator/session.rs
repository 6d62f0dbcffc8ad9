//! The per-session task: reads actions, runs turns, emits events in order.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use smart_query_core::{
    ClientAction, ConversationContext, FailureKind, PipelineStage, SessionEvent, VerifiedQuery,
    MAX_QUESTION_LENGTH, SESSION_CHANNEL_CAPACITY,
};
use smart_query_llm::ReviewRequest;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use super::state::{ConversationState, Stage};
use super::Pipeline;
use crate::clarification::ClarificationOutcome;
use crate::matcher::MatchOutcome;
use crate::review::{review_decision, FinalSql, ReviewDecision};
use crate::ServiceError;

/// Why a turn ended early.
enum Halt {
    /// `Stopped` was already emitted.
    Stopped,
    Failed { stage: PipelineStage, kind: FailureKind, error: ServiceError },
}

enum TurnEnd {
    Completed,
    AwaitingClarification,
}

/// Channels of one session plus actions received while a step was running.
struct SessionIo {
    inbox: mpsc::Receiver<ClientAction>,
    outbox: mpsc::Sender<SessionEvent>,
    pending: VecDeque<ClientAction>,
    inbox_closed: bool,
    outbox_closed: bool,
}

impl SessionIo {
    async fn next_action(&mut self) -> Option<ClientAction> {
        if let Some(action) = self.pending.pop_front() {
            return Some(action);
        }
        if self.inbox_closed {
            return None;
        }
        let action = self.inbox.recv().await;
        self.inbox_closed = action.is_none();
        action
    }

    async fn emit(&mut self, event: SessionEvent) {
        if self.outbox_closed {
            return;
        }
        tracing::trace!(step = event.step(), "event");
        if self.outbox.send(event).await.is_err() {
            tracing::debug!("event receiver dropped");
            self.outbox_closed = true;
        }
    }

    /// Hold an action for after the turn. Bounded like the inbox; overflow is
    /// dropped with a warning.
    fn queue(&mut self, action: ClientAction) {
        if self.pending.len() >= SESSION_CHANNEL_CAPACITY {
            tracing::warn!(pending = self.pending.len(), "action queue full, dropping action");
            return;
        }
        self.pending.push_back(action);
    }

    /// Drain the inbox without waiting; anything but `stop` is queued.
    fn stop_requested(&mut self) -> bool {
        let mut stop = false;
        loop {
            match self.inbox.try_recv() {
                Ok(ClientAction::Stop) => stop = true,
                Ok(action) => self.queue(action),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.inbox_closed = true;
                    break;
                },
            }
        }
        stop
    }

    /// Run one sub-operation while listening for `stop`.
    ///
    /// A stop emits `Stopped` at once. The dispatched call is still awaited,
    /// then its result is discarded.
    async fn guard<F: Future>(&mut self, stage: PipelineStage, op: F) -> Result<F::Output, Halt> {
        if self.stop_requested() {
            self.emit(SessionEvent::Stopped { stage }).await;
            return Err(Halt::Stopped);
        }
        tokio::pin!(op);
        loop {
            tokio::select! {
                biased;
                action = self.inbox.recv(), if !self.inbox_closed => match action {
                    Some(ClientAction::Stop) => {
                        self.emit(SessionEvent::Stopped { stage }).await;
                        let _late = op.as_mut().await;
                        tracing::warn!(stage = %stage, "discarded a result that arrived after stop");
                        return Err(Halt::Stopped);
                    },
                    Some(action) => self.queue(action),
                    None => self.inbox_closed = true,
                },
                output = &mut op => return Ok(output),
            }
        }
    }

    /// [`Self::guard`] for fallible steps: an error fails the turn at `stage`.
    async fn step<T, F>(&mut self, stage: PipelineStage, kind: FailureKind, op: F) -> Result<T, Halt>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        self.guard(stage, op).await?.map_err(|error| Halt::Failed { stage, kind, error })
    }
}

pub(super) struct Session {
    pipeline: Arc<Pipeline>,
    io: SessionIo,
    state: ConversationState,
    prior_turn: Option<String>,
    turn: u64,
}

impl Session {
    pub(super) fn new(
        pipeline: Arc<Pipeline>,
        inbox: mpsc::Receiver<ClientAction>,
        outbox: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self {
            pipeline,
            io: SessionIo { inbox, outbox, pending: VecDeque::new(), inbox_closed: false, outbox_closed: false },
            state: ConversationState::default(),
            prior_turn: None,
            turn: 0,
        }
    }

    pub(super) async fn run(mut self) {
        tracing::info!("session opened");
        while let Some(action) = self.io.next_action().await {
            match action {
                ClientAction::Ask { question, clarify } => self.ask(question, clarify).await,
                ClientAction::SelectClarification { selected_question, original_question } => {
                    self.select_clarification(selected_question, original_question).await;
                },
                ClientAction::Stop => self.stop_idle().await,
                ClientAction::Reset => self.reset(),
            }
            if self.io.outbox_closed {
                break;
            }
        }
        tracing::info!(turns = self.turn, "session closed");
    }

    async fn ask(&mut self, question: String, clarify: bool) {
        self.turn = self.turn.saturating_add(1);
        self.state = ConversationState::new(question.trim().to_owned());
        tracing::info!(turn = self.turn, clarify, "question received");
        let outcome = match validate_question(&self.state.question) {
            Ok(()) => self.clarify_then_answer(clarify).await,
            Err(error) => Err(Halt::Failed { stage: PipelineStage::Idle, kind: FailureKind::InvalidInput, error }),
        };
        self.finish(outcome).await;
    }

    async fn select_clarification(&mut self, selected: String, original: String) {
        if !self.state.is_awaiting_clarification() {
            self.turn = self.turn.saturating_add(1);
            tracing::debug!(turn = self.turn, "clarification selected without a pending question, starting a turn");
        }
        let mut state = ConversationState::new(original.trim().to_owned());
        state.enhanced_question = Some(selected.trim().to_owned());
        self.state = state;
        let outcome = match validate_question(self.state.working_question()) {
            Ok(()) => self.answer().await,
            Err(error) => Err(Halt::Failed { stage: PipelineStage::Idle, kind: FailureKind::InvalidInput, error }),
        };
        self.finish(outcome).await;
    }

    async fn stop_idle(&mut self) {
        if self.state.is_awaiting_clarification() {
            self.io.emit(SessionEvent::Stopped { stage: PipelineStage::AwaitingClarification }).await;
            self.state = ConversationState::default();
            tracing::info!(turn = self.turn, "stopped while awaiting clarification");
        } else {
            tracing::debug!("stop received while idle");
        }
    }

    fn reset(&mut self) {
        self.state = ConversationState::default();
        self.prior_turn = None;
        tracing::info!("conversation reset");
    }

    fn context(&self) -> ConversationContext {
        ConversationContext::for_date(chrono::Local::now().date_naive())
            .with_user_profile(self.pipeline.config.user_profile.clone())
            .with_prior_turn(self.prior_turn.clone())
    }

    /// Set the stage and announce it before any work in it starts.
    async fn enter(&mut self, stage: Stage) {
        let kind = stage.kind();
        let event = match stage.iteration() {
            Some((iteration, max)) => SessionEvent::progress_iteration(kind, iteration, max),
            None => SessionEvent::progress(kind),
        };
        tracing::debug!(turn = self.turn, stage = %kind, "entering stage");
        self.state.stage = stage;
        self.io.emit(event).await;
    }

    async fn clarify_then_answer(&mut self, clarify: bool) -> Result<TurnEnd, Halt> {
        if clarify {
            let pipeline = Arc::clone(&self.pipeline);
            let question = self.state.question.clone();
            let context = self.context();
            self.enter(Stage::AwaitingClarification { options: Vec::new() }).await;
            let outcome = self
                .io
                .guard(PipelineStage::AwaitingClarification, pipeline.resolver.resolve(&question, &context))
                .await?;
            match outcome {
                Ok(ClarificationOutcome::Ask(options)) => {
                    self.io
                        .emit(SessionEvent::IntentClarifications {
                            original_question: question,
                            clarifications: options.clone(),
                        })
                        .await;
                    self.state.stage = Stage::AwaitingClarification { options };
                    return Ok(TurnEnd::AwaitingClarification);
                },
                Ok(ClarificationOutcome::Clear) => {},
                Err(e) => {
                    tracing::warn!(turn = self.turn, error = %e, "clarification failed, continuing with the question as asked");
                },
            }
        }
        self.answer().await
    }

    /// Matching through follow-ups for the current working question.
    async fn answer(&mut self) -> Result<TurnEnd, Halt> {
        let pipeline = Arc::clone(&self.pipeline);
        let original_question = self.state.question.clone();
        let question = self.state.working_question().to_owned();
        let context = self.context();

        self.enter(Stage::MatchingQuery).await;
        let outcome = self
            .io
            .step(PipelineStage::MatchingQuery, FailureKind::Matching, pipeline.matcher.find(&question))
            .await?;
        let matched = match outcome {
            MatchOutcome::Matched(matched) => matched,
            MatchOutcome::NoMatch { reasoning } => {
                tracing::info!(turn = self.turn, reasoning = %reasoning, "no verified query matches");
                self.io.emit(SessionEvent::NoMatch { question, message: no_match_message(&reasoning) }).await;
                return Ok(TurnEnd::Completed);
            },
        };
        let query = Arc::clone(&matched.query);
        self.io
            .emit(SessionEvent::BestQuery {
                query: query.summary(),
                matched_question: matched.matched_question,
                distance: matched.distance,
                confidence: matched.confidence,
                reasoning: matched.reasoning,
            })
            .await;

        self.enter(Stage::Recommending { query: Arc::clone(&query) }).await;
        let recommendation = self
            .io
            .step(
                PipelineStage::Recommending,
                FailureKind::Adaptation,
                pipeline.adapter.recommend(&query, &question, &context),
            )
            .await?;
        self.state.enhanced_question = Some(recommendation.enhanced_question.clone());
        self.io
            .emit(SessionEvent::Recommendations {
                enhanced_question: recommendation.enhanced_question.clone(),
                modifications: recommendation.modifications.clone(),
                explanation: recommendation.explanation.clone(),
            })
            .await;

        let modified_sql = if recommendation.is_unmodified() {
            None
        } else {
            self.enter(Stage::Modifying {
                query: Arc::clone(&query),
                modifications: recommendation.modifications.clone(),
            })
            .await;
            let modified = self
                .io
                .step(PipelineStage::Modifying, FailureKind::Adaptation, pipeline.adapter.modify(&query.sql, &recommendation))
                .await?;
            self.io
                .emit(SessionEvent::ModifiedSql { sql: modified.sql.clone(), explanation: modified.explanation })
                .await;
            Some(modified.sql)
        };

        let final_sql = match modified_sql {
            Some(candidate) => {
                self.review_loop(&pipeline, &query, candidate, &original_question, &recommendation.enhanced_question)
                    .await?
            },
            None if pipeline.config.review_unmodified => {
                self.review_loop(&pipeline, &query, query.sql.clone(), &original_question, &recommendation.enhanced_question)
                    .await?
            },
            None => FinalSql::unreviewed(&query.sql),
        };
        self.io
            .emit(SessionEvent::FinalSql {
                sql: final_sql.sql.clone(),
                review_applied: final_sql.review_applied,
                max_iterations_reached: final_sql.max_iterations_reached,
                residual_concerns: final_sql.residual_concerns.clone(),
            })
            .await;

        self.enter(Stage::Executing { query: Arc::clone(&query), final_sql: final_sql.sql.clone() }).await;
        let results = self
            .io
            .step(PipelineStage::Executing, FailureKind::Execution, async {
                pipeline.executor.execute(&final_sql.sql).await.map_err(ServiceError::from)
            })
            .await?;
        tracing::info!(
            turn = self.turn,
            query_id = %query.id,
            rows = results.row_count(),
            truncated = results.truncated,
            "query executed"
        );
        let narrative = match &pipeline.narrator {
            Some(narrator) => {
                self.io
                    .guard(PipelineStage::Executing, narrator.narrate(&question, &results, &context))
                    .await?
            },
            None => None,
        };
        self.io.emit(SessionEvent::QueryResults { results, narrative }).await;

        self.enter(Stage::PlanningFollowUps { query: Arc::clone(&query), final_sql: final_sql.sql }).await;
        let suggestions = self
            .io
            .step(PipelineStage::PlanningFollowUps, FailureKind::FollowUp, pipeline.planner.plan(&question, &query))
            .await?;
        self.io.emit(SessionEvent::FollowUps { suggestions }).await;
        Ok(TurnEnd::Completed)
    }

    /// Review passes `1..=N`; always yields SQL to execute unless a pass fails.
    async fn review_loop(
        &mut self,
        pipeline: &Pipeline,
        query: &Arc<VerifiedQuery>,
        mut candidate: String,
        original_question: &str,
        enhanced_question: &str,
    ) -> Result<FinalSql, Halt> {
        let max = pipeline.config.max_review_iterations;
        let mut review_applied = false;
        for iteration in 1..=max {
            self.enter(Stage::Reviewing {
                query: Arc::clone(query),
                iteration,
                max_iterations: max,
                candidate_sql: candidate.clone(),
            })
            .await;
            self.io
                .emit(SessionEvent::ReviewStatus {
                    iteration,
                    max_iterations: max,
                    message: format!("Reviewing the SQL (pass {iteration} of {max})"),
                })
                .await;

            let request = ReviewRequest {
                verified_query: query,
                candidate_sql: &candidate,
                original_question,
                enhanced_question,
                iteration,
                max_iterations: max,
            };
            let review = self
                .io
                .step(PipelineStage::Reviewing, FailureKind::Adaptation, pipeline.adapter.review(&request))
                .await?;
            let decision = review_decision(iteration, max, &review, &candidate);
            let residual = review.residual_note();
            self.io.emit(SessionEvent::ReviewFindings { iteration, review }).await;

            match decision {
                ReviewDecision::Accept => {
                    tracing::info!(turn = self.turn, iteration, "review accepted the SQL");
                    return Ok(FinalSql {
                        sql: candidate,
                        review_applied,
                        max_iterations_reached: false,
                        residual_concerns: None,
                    });
                },
                ReviewDecision::Revise(corrected) => {
                    tracing::info!(turn = self.turn, iteration, "review corrected the SQL");
                    candidate = corrected;
                    review_applied = true;
                },
                ReviewDecision::Exhausted(corrected) => {
                    tracing::warn!(
                        turn = self.turn,
                        iteration,
                        max_iterations = max,
                        "review did not converge, executing the last correction"
                    );
                    return Ok(FinalSql {
                        sql: corrected,
                        review_applied: true,
                        max_iterations_reached: true,
                        residual_concerns: Some(residual),
                    });
                },
            }
        }
        Ok(FinalSql { sql: candidate, review_applied, max_iterations_reached: true, residual_concerns: None })
    }

    async fn finish(&mut self, outcome: Result<TurnEnd, Halt>) {
        match outcome {
            Ok(TurnEnd::AwaitingClarification) => return,
            Ok(TurnEnd::Completed) => {
                if let Some(summary) = self.state.summary() {
                    self.prior_turn = Some(summary);
                }
                self.io.emit(SessionEvent::TurnCompleted {}).await;
                tracing::info!(turn = self.turn, "turn completed");
            },
            Err(Halt::Stopped) => {
                let at = self.state.stage.kind();
                tracing::info!(turn = self.turn, stage = %at, "turn stopped");
                self.state.stage = Stage::Stopped { at };
            },
            Err(Halt::Failed { stage, kind, error }) => {
                tracing::warn!(turn = self.turn, stage = %stage, kind = %kind, error = %error, "turn failed");
                self.state.stage = Stage::Failed { at: stage };
                self.io.emit(SessionEvent::Error { stage, kind, message: error.user_message() }).await;
            },
        }
        self.state = ConversationState::default();
    }
}

fn validate_question(question: &str) -> Result<(), ServiceError> {
    if question.trim().is_empty() {
        return Err(ServiceError::InvalidInput("The question is empty".to_owned()));
    }
    if question.chars().count() > MAX_QUESTION_LENGTH {
        return Err(ServiceError::InvalidInput(format!(
            "The question is longer than {MAX_QUESTION_LENGTH} characters"
        )));
    }
    Ok(())
}

fn no_match_message(reasoning: &str) -> String {
    let base = "No verified query answers this question. Try rephrasing it or ask about a related metric.";
    if reasoning.trim().is_empty() { base.to_owned() } else { format!("{base} ({})", reasoning.trim()) }
}
