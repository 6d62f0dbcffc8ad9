//! Conversation commands: interactive `chat` and one-shot `ask`.
//!
//! Events are written to stdout as one JSON object per line; logs go to stderr.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use smart_query_core::{ClientAction, SessionEvent};
use smart_query_service::{Collaborators, ConversationService, PipelineConfig};
use smart_query_storage::PgExecutor;
use tokio::io::{AsyncBufReadExt as _, BufReader};

use super::{llm_client, load_embedder, open_library};
use crate::get_database_url;

async fn start_service(catalog: Option<&Path>) -> Result<ConversationService> {
    let llm = llm_client()?;
    let config = PipelineConfig::from_env();
    let business_url = get_database_url("SMART_QUERY_BUSINESS_DATABASE_URL")?;
    let executor = PgExecutor::new(&business_url, config.max_result_rows).await?;
    let embedder = load_embedder().await?;
    let library = open_library(catalog, Some(Arc::clone(&embedder))).await?;

    let collaborators = Collaborators {
        llm,
        embedder,
        store: library.clone(),
        search: library,
        executor: Arc::new(executor),
    };
    Ok(ConversationService::new(collaborators, config))
}

fn print_event(event: &SessionEvent) -> Result<()> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

pub(crate) async fn run_chat(catalog: Option<&Path>) -> Result<()> {
    let service = start_service(catalog).await?;
    let mut session = service.open_session();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input = ChatInput::default();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if let Some(action) = input.parse(&line) {
                    session.send(action).await?;
                }
            }
            event = session.next_event() => {
                let Some(event) = event else { return Ok(()) };
                input.observe(&event);
                print_event(&event)?;
            }
        }
    }

    // End of input: queued questions still run to completion.
    drop(session.actions);
    while let Some(event) = session.events.recv().await {
        print_event(&event)?;
    }
    Ok(())
}

pub(crate) async fn run_ask(catalog: Option<&Path>, question: String, clarify: bool) -> Result<()> {
    let service = start_service(catalog).await?;
    let mut session = service.open_session();
    session.send(ClientAction::Ask { question, clarify }).await?;

    let mut failure = None;
    while let Some(event) = session.next_event().await {
        print_event(&event)?;
        match &event {
            SessionEvent::Error { message, .. } => {
                failure = Some(message.clone());
                break;
            },
            SessionEvent::IntentClarifications { .. } => break,
            e if e.ends_turn() => break,
            _ => {},
        }
    }
    session.close().await;

    if let Some(message) = failure {
        bail!(message);
    }
    Ok(())
}

/// Turns stdin lines into actions.
///
/// A bare number picks one of the clarification options just offered; `stop`
/// and `reset` map to their actions; a line starting with `{` is read as a
/// JSON action; anything else is a new question.
#[derive(Debug, Default)]
struct ChatInput {
    offered: Option<(String, Vec<String>)>,
}

impl ChatInput {
    fn observe(&mut self, event: &SessionEvent) {
        self.offered = match event {
            SessionEvent::IntentClarifications { original_question, clarifications } => Some((
                original_question.clone(),
                clarifications.iter().map(|c| c.text.clone()).collect(),
            )),
            _ => None,
        };
    }

    fn parse(&mut self, line: &str) -> Option<ClientAction> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if line.starts_with('{') {
            return match serde_json::from_str(line) {
                Ok(action) => Some(action),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring malformed action line");
                    None
                },
            };
        }
        match line {
            "stop" => return Some(ClientAction::Stop),
            "reset" => return Some(ClientAction::Reset),
            _ => {},
        }

        if let (Ok(choice), Some((original, options))) = (line.parse::<usize>(), &self.offered) {
            let Some(selected) = choice.checked_sub(1).and_then(|i| options.get(i)) else {
                tracing::warn!(choice, options = options.len(), "no such clarification option");
                return None;
            };
            let action = ClientAction::SelectClarification {
                selected_question: selected.clone(),
                original_question: original.clone(),
            };
            self.offered = None;
            return Some(action);
        }

        Some(ClientAction::Ask { question: line.to_owned(), clarify: true })
    }
}
