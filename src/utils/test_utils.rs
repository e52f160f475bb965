use crate::api::{AnsweringBackend, Capabilities, ConverseOptions, Reply, ToolOutcome};
use crate::commands::ChatContext;
use crate::core::error::RequestError;
use crate::core::message::{Model, ThinkingStep, Tool, Turn};
use crate::core::session::SessionController;
use crate::core::store::MemoryStore;
use crate::utils::logging::TranscriptLog;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Backend with a fixed catalog that answers from a queue of replies.
///
/// Knobs: queued discovery failures, scripted health checks, and an optional
/// gate that holds every converse call until the test releases it.
pub struct StubBackend {
    pub models: Vec<Model>,
    pub tools: Vec<Tool>,
    replies: Mutex<VecDeque<Result<Reply, RequestError>>>,
    discovery_failures: Mutex<VecDeque<RequestError>>,
    health_script: Mutex<VecDeque<bool>>,
    healthy: bool,
    checks: AtomicUsize,
    seen: Mutex<Vec<(Vec<Turn>, ConverseOptions)>>,
    gate: Option<Gate>,
}

struct Gate {
    entered: Notify,
    release: Notify,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::with_models(create_test_models())
    }

    pub fn with_models(models: Vec<Model>) -> Self {
        Self {
            models,
            tools: vec![create_test_tool("calculator", "math")],
            replies: Mutex::new(VecDeque::new()),
            discovery_failures: Mutex::new(VecDeque::new()),
            health_script: Mutex::new(VecDeque::new()),
            healthy: true,
            checks: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn reply(self, content: &str, thinking_steps: Vec<ThinkingStep>) -> Self {
        self.replies.lock().unwrap().push_back(Ok(Reply {
            content: content.to_string(),
            thinking_steps,
        }));
        self
    }

    pub fn fail(self, err: RequestError) -> Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    /// The next discovery call fails with `err`; later calls succeed.
    pub fn fail_discovery(self, err: RequestError) -> Self {
        self.discovery_failures.lock().unwrap().push_back(err);
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// Health checks answer from `script` first, then with the default.
    pub fn health_sequence(self, script: &[bool]) -> Self {
        self.health_script.lock().unwrap().extend(script);
        self
    }

    /// Hold every converse call until [`StubBackend::release_converse`].
    pub fn gated(mut self) -> Self {
        self.gate = Some(Gate {
            entered: Notify::new(),
            release: Notify::new(),
        });
        self
    }

    /// Wait until a gated converse call is in flight.
    pub async fn converse_started(&self) {
        if let Some(gate) = &self.gate {
            gate.entered.notified().await;
        }
    }

    pub fn release_converse(&self) {
        if let Some(gate) = &self.gate {
            gate.release.notify_one();
        }
    }

    pub fn check_count(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    /// History and options of every converse call, in call order.
    pub fn seen_requests(&self) -> Vec<(Vec<Turn>, ConverseOptions)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnsweringBackend for StubBackend {
    async fn discover_capabilities(&self) -> Result<Capabilities, RequestError> {
        if let Some(err) = self.discovery_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(Capabilities {
            models: self.models.clone(),
            tools: self.tools.clone(),
        })
    }

    async fn health_check(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.health_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.healthy)
    }

    async fn converse(
        &self,
        turns: &[Turn],
        _model: &Model,
        options: &ConverseOptions,
    ) -> Result<Reply, RequestError> {
        self.seen.lock().unwrap().push((turns.to_vec(), *options));
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(RequestError::Empty))
    }

    async fn execute_tool(&self, name: &str, arguments: &Value) -> Result<ToolOutcome, RequestError> {
        Ok(ToolOutcome {
            tool: name.to_string(),
            result: json!({ "echo": arguments }),
        })
    }

    async fn list_tool_categories(&self) -> Result<BTreeMap<String, Vec<Tool>>, RequestError> {
        let mut categories = BTreeMap::new();
        for tool in &self.tools {
            categories
                .entry(tool.category.clone())
                .or_insert_with(Vec::new)
                .push(tool.clone());
        }
        Ok(categories)
    }
}

pub fn create_test_models() -> Vec<Model> {
    vec![
        Model::new("gpt-4o", "GPT-4o", "openai").with_description("General purpose"),
        Model::new("claude-3-sonnet", "Claude 3 Sonnet", "anthropic"),
    ]
}

pub fn create_test_tool(name: &str, category: &str) -> Tool {
    Tool {
        id: name.to_string(),
        name: name.to_string(),
        description: format!("The {name} tool"),
        category: category.to_string(),
        icon: String::new(),
        schema: json!({}),
    }
}

pub fn create_test_step(kind: &str, title: &str, duration_ms: Option<u64>) -> ThinkingStep {
    ThinkingStep {
        kind: kind.to_string(),
        title: title.to_string(),
        content: format!("{title} details"),
        timestamp: Utc::now(),
        duration_ms,
        metadata: BTreeMap::new(),
    }
}

/// A session that has already connected to `backend`.
pub async fn create_ready_session(backend: impl Into<Arc<StubBackend>>) -> SessionController {
    let backend: Arc<StubBackend> = backend.into();
    let session = SessionController::new(
        backend,
        Arc::new(MemoryStore::new()),
        ConverseOptions::default(),
    );
    let state = session.initialize().await;
    assert!(state.is_ready(), "stub session should connect: {state:?}");
    session
}

pub async fn create_test_context(backend: impl Into<Arc<StubBackend>>) -> ChatContext {
    ChatContext::new(
        create_ready_session(backend).await,
        TranscriptLog::new(None).unwrap(),
        "http://stub.test".to_string(),
    )
}
