//! In-process doubles for the pipeline collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{Map, Value};
use smart_query_core::{ExampleQuestion, QueryResults, VerifiedQuery};
use smart_query_embeddings::{EmbeddingError, EmbeddingProvider};
use smart_query_llm::{CompletionProvider, LlmError, PromptKind, StructuredPrompt};
use smart_query_storage::{ExecutionError, MemoryStore, SqlExecutor};
use tokio::sync::Notify;

enum Scripted {
    Reply(String),
    Status(u16),
}

/// LLM double answering from per-step queues. An empty queue falls back to the
/// step's default reply, or fails with `EmptyResponse`.
#[derive(Default)]
pub struct ScriptedLlm {
    queues: Mutex<HashMap<PromptKind, VecDeque<Scripted>>>,
    defaults: Mutex<HashMap<PromptKind, String>>,
    gates: Mutex<HashMap<PromptKind, Arc<Notify>>>,
    prompts: Mutex<Vec<StructuredPrompt>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, kind: PromptKind, content: &str) {
        self.push(kind, Scripted::Reply(content.to_owned()));
    }

    pub fn fail(&self, kind: PromptKind, status: u16) {
        self.push(kind, Scripted::Status(status));
    }

    pub fn always(&self, kind: PromptKind, content: &str) {
        self.defaults.lock().unwrap().insert(kind, content.to_owned());
    }

    /// Calls of `kind` wait until the returned gate is notified once per call.
    pub fn gate(&self, kind: PromptKind) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(kind, Arc::clone(&gate));
        gate
    }

    pub fn calls(&self, kind: PromptKind) -> usize {
        self.prompts.lock().unwrap().iter().filter(|p| p.kind == kind).count()
    }

    pub fn prompts(&self, kind: PromptKind) -> Vec<StructuredPrompt> {
        self.prompts.lock().unwrap().iter().filter(|p| p.kind == kind).cloned().collect()
    }

    fn push(&self, kind: PromptKind, scripted: Scripted) {
        self.queues.lock().unwrap().entry(kind).or_default().push_back(scripted);
    }
}

#[async_trait]
impl CompletionProvider for ScriptedLlm {
    async fn complete(&self, prompt: &StructuredPrompt) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        let gate = self.gates.lock().unwrap().get(&prompt.kind).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let next = self.queues.lock().unwrap().get_mut(&prompt.kind).and_then(VecDeque::pop_front);
        match next {
            Some(Scripted::Reply(content)) => Ok(content),
            Some(Scripted::Status(code)) => Err(LlmError::HttpStatus { code, body: "scripted".to_owned() }),
            None => self.defaults.lock().unwrap().get(&prompt.kind).cloned().ok_or(LlmError::EmptyResponse),
        }
    }
}

/// Embeds known texts to fixed vectors, anything else to `fallback`.
pub struct StaticEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
}

impl StaticEmbedder {
    pub fn new(entries: &[(&str, [f32; 3])]) -> Self {
        Self {
            vectors: entries.iter().map(|(text, v)| ((*text).to_owned(), v.to_vec())).collect(),
            fallback: vec![0.5, 0.5, 0.5],
        }
    }
}

impl EmbeddingProvider for StaticEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.vectors.get(text).cloned().unwrap_or_else(|| self.fallback.clone()))
    }

    fn dimension(&self) -> usize {
        3
    }
}

/// Records every statement and answers with a fixed result or SQL error.
pub struct RecordingExecutor {
    executed: Mutex<Vec<String>>,
    failure: Mutex<Option<String>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self { executed: Mutex::new(Vec::new()), failure: Mutex::new(None) }
    }

    /// The next execution fails with this database message.
    pub fn fail_next(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_owned());
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlExecutor for RecordingExecutor {
    async fn execute(&self, sql: &str) -> Result<QueryResults, ExecutionError> {
        self.executed.lock().unwrap().push(sql.to_owned());
        if let Some(message) = self.failure.lock().unwrap().take() {
            return Err(ExecutionError::Sql { message });
        }
        let mut row = Map::new();
        row.insert("total".to_owned(), Value::from(1_250_000));
        Ok(QueryResults { columns: vec!["total".to_owned()], rows: vec![row], truncated: false })
    }
}

pub fn make_query(id: &str, name: &str, sql: &str, examples: &[(&str, [f32; 3])], follow_ups: &[&str]) -> VerifiedQuery {
    VerifiedQuery {
        id: id.to_owned(),
        name: name.to_owned(),
        sql: sql.to_owned(),
        explanation: format!("{name} from the reporting schema"),
        instructions: Some("Adjust the date filter for other periods".to_owned()),
        tables_used: ["premium".to_owned()].into_iter().collect(),
        questions: examples
            .iter()
            .map(|(text, v)| ExampleQuestion::new(*text).with_embedding(v.to_vec()))
            .collect(),
        follow_ups: follow_ups.iter().map(|s| (*s).to_owned()).collect(),
        verified_by: "analyst".to_owned(),
        verified_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    }
}

pub const PREMIUMS_SQL: &str = "SELECT SUM(amount) AS total_premium FROM premium";

/// Insurance reporting library used by the pipeline tests.
///
/// q1 total premiums (follows up with q2), q2 claims by region, q3 agent
/// performance, q4 regional team revenue.
pub fn reporting_catalog() -> MemoryStore {
    MemoryStore::from_queries([
        make_query("q1", "Total premiums", PREMIUMS_SQL, &[("total premiums last month", [1.0, 0.0, 0.0])], &["q2"]),
        make_query(
            "q2",
            "Claims by region",
            "SELECT region, COUNT(*) AS claims FROM claim GROUP BY region",
            &[("claims by region", [0.0, 1.0, 0.0])],
            &[],
        ),
        make_query(
            "q3",
            "Agent performance",
            "SELECT agent, SUM(amount) AS sales FROM premium GROUP BY agent",
            &[("sales per agent on my team", [0.0, 0.0, 1.0])],
            &[],
        ),
        make_query(
            "q4",
            "Team revenue by region",
            "SELECT region, SUM(amount) AS revenue FROM premium GROUP BY region",
            &[("team revenue by region", [0.0, 0.6, 0.8])],
            &[],
        ),
    ])
}

pub fn reporting_embedder() -> StaticEmbedder {
    StaticEmbedder::new(&[
        ("show total premiums last month", [1.0, 0.0, 0.0]),
        ("total premiums for January by line of business", [0.98, 0.0, 0.2]),
        ("claims by region", [0.0, 1.0, 0.0]),
        ("sales per agent on my team", [0.0, 0.0, 1.0]),
        ("team revenue by region", [0.0, 0.6, 0.8]),
    ])
}
