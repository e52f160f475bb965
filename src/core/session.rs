//! Conversation session controller.
//!
//! Owns the active [`Conversation`], the cached capability catalogs and the
//! connection state machine:
//!
//! ```text
//! Uninitialized -> Connecting -> Ready(Idle) <-> Ready(Sending)
//!                            \-> ConnectionFailed -> Connecting ...
//! ```
//!
//! The controller is a cheap handle around shared state. The state lock is
//! never held across an `.await`; every mutation persists before the lock is
//! released so the store sees mutations in the order they happened.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::api::{AnsweringBackend, Capabilities, ConverseOptions, ToolOutcome};
use crate::core::error::{ConnectionError, RequestError, SessionError};
use crate::core::message::{Conversation, Model, Tool, Turn};
use crate::core::store::ConversationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Idle,
    Sending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Connecting,
    Ready(Activity),
    ConnectionFailed { diagnostic: String },
}

impl SessionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready(_))
    }

    pub fn is_sending(&self) -> bool {
        matches!(self, SessionState::Ready(Activity::Sending))
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "not connected",
            SessionState::Connecting => "connecting",
            SessionState::Ready(Activity::Idle) => "ready",
            SessionState::Ready(Activity::Sending) => "waiting for an answer",
            SessionState::ConnectionFailed { .. } => "connection failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyInput,
    NotReady,
    /// A request is already in flight; the message was dropped, not queued.
    Busy,
    NothingToRetry,
}

/// Which path a `send_message` call took.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// An assistant turn with the backend's answer was appended.
    Answered,
    /// An assistant turn carrying the normalized error message was appended.
    Failed(RequestError),
    /// Nothing was appended.
    Ignored(IgnoreReason),
}

struct SessionData {
    state: SessionState,
    conversation: Option<Conversation>,
    models: Vec<Model>,
    tools: Vec<Tool>,
    options: ConverseOptions,
}

struct Inner {
    backend: Arc<dyn AnsweringBackend>,
    store: Arc<dyn ConversationStore>,
    data: Mutex<SessionData>,
}

#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(
        backend: Arc<dyn AnsweringBackend>,
        store: Arc<dyn ConversationStore>,
        options: ConverseOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                store,
                data: Mutex::new(SessionData {
                    state: SessionState::Uninitialized,
                    conversation: None,
                    models: Vec::new(),
                    tools: Vec::new(),
                    options,
                }),
            }),
        }
    }

    pub fn backend(&self) -> Arc<dyn AnsweringBackend> {
        Arc::clone(&self.inner.backend)
    }

    /// Discover capabilities and check liveness, then restore or create the
    /// conversation. Failures land in [`SessionState::ConnectionFailed`];
    /// call again to retry.
    pub async fn initialize(&self) -> SessionState {
        {
            let mut data = self.lock();
            if matches!(
                data.state,
                SessionState::Connecting | SessionState::Ready(Activity::Sending)
            ) {
                debug!(state = ?data.state, "initialize ignored");
                return data.state.clone();
            }
            data.state = SessionState::Connecting;
        }

        let backend = &self.inner.backend;
        let (discovery, healthy) =
            tokio::join!(backend.discover_capabilities(), backend.health_check());

        let checked = match discovery {
            Err(err) => {
                debug!(detail = ?err.detail(), "capability discovery failed");
                Err(ConnectionError::Discovery(err))
            }
            Ok(_) if !healthy => Err(ConnectionError::Unhealthy),
            Ok(caps) if caps.models.is_empty() => Err(ConnectionError::NoModels),
            Ok(caps) => Ok(caps),
        };

        let mut data = self.lock();
        match checked {
            Ok(Capabilities { models, tools }) => {
                if data.conversation.is_none() {
                    data.conversation = Some(self.restore_or_create(&models));
                }
                info!(
                    models = models.len(),
                    tools = tools.len(),
                    "session ready"
                );
                data.models = models;
                data.tools = tools;
                data.state = SessionState::Ready(Activity::Idle);
            }
            Err(err) => {
                warn!(error = %err, "connection failed");
                data.state = SessionState::ConnectionFailed {
                    diagnostic: err.to_string(),
                };
            }
        }
        data.state.clone()
    }

    /// Send one user message and wait for the answer. See [`SendOutcome`]
    /// for the paths this can take.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::Ignored(IgnoreReason::EmptyInput);
        }

        let (turns, model, options) = {
            let mut guard = self.lock();
            let data = &mut *guard;
            match data.state {
                SessionState::Ready(Activity::Idle) => {}
                SessionState::Ready(Activity::Sending) => {
                    debug!("send ignored; a request is already in flight");
                    return SendOutcome::Ignored(IgnoreReason::Busy);
                }
                _ => return SendOutcome::Ignored(IgnoreReason::NotReady),
            }
            let Some(conversation) = data.conversation.as_mut() else {
                return SendOutcome::Ignored(IgnoreReason::NotReady);
            };
            conversation.append(Turn::user(text));
            self.persist(conversation);
            let snapshot = (
                conversation.turns.clone(),
                conversation.model.clone(),
                data.options,
            );
            data.state = SessionState::Ready(Activity::Sending);
            snapshot
        };

        let in_flight = InFlight {
            controller: self,
            settled: false,
        };
        let result = self
            .inner
            .backend
            .converse(&turns, &model, &options)
            .await;
        in_flight.settle(result)
    }

    /// Re-send the most recent user message as a new user turn.
    pub async fn retry_last(&self) -> SendOutcome {
        let last = self.lock().conversation.as_ref().and_then(|conversation| {
            conversation
                .last_user_turn()
                .map(|turn| turn.content.clone())
        });
        match last {
            Some(text) => self.send_message(&text).await,
            None => SendOutcome::Ignored(IgnoreReason::NothingToRetry),
        }
    }

    /// Replace the active model and record the switch as a system turn.
    /// Returns `false` when there is no conversation yet or an answer is
    /// still pending.
    pub fn change_model(&self, model: Model) -> bool {
        let mut data = self.lock();
        if data.state.is_sending() {
            debug!("model switch refused while an answer is pending");
            return false;
        }
        let Some(conversation) = data.conversation.as_mut() else {
            return false;
        };
        let notice = format!("Switched model to {} ({})", model.name, model.provider);
        conversation.set_model(model);
        self.persist(conversation);
        conversation.append(Turn::system(notice));
        self.persist(conversation);
        true
    }

    /// Resolve `id` against the cached catalog and switch to it.
    pub fn change_model_by_id(&self, id: &str) -> Option<Model> {
        let model = {
            let data = self.lock();
            data.models
                .iter()
                .find(|model| model.id == id)
                .or_else(|| {
                    data.models
                        .iter()
                        .find(|model| model.id.eq_ignore_ascii_case(id))
                })
                .cloned()
        }?;
        self.change_model(model.clone()).then_some(model)
    }

    /// Drop every turn. The conversation id and model are kept. Refused
    /// while an answer is pending, so the answer never lands without its
    /// question.
    pub fn clear_chat(&self) -> bool {
        let mut data = self.lock();
        if data.state.is_sending() {
            debug!("clear refused while an answer is pending");
            return false;
        }
        let Some(conversation) = data.conversation.as_mut() else {
            return false;
        };
        conversation.clear();
        self.persist(conversation);
        true
    }

    /// Flip the tool flag used by the next send. Returns the new value.
    pub fn toggle_tools(&self) -> bool {
        let mut data = self.lock();
        data.options.tools_enabled = !data.options.tools_enabled;
        data.options.tools_enabled
    }

    pub async fn execute_tool(
        &self,
        name: &str,
        arguments: &Value,
    ) -> Result<ToolOutcome, SessionError> {
        self.ensure_ready()?;
        Ok(self.inner.backend.execute_tool(name, arguments).await?)
    }

    pub async fn tool_categories(&self) -> Result<BTreeMap<String, Vec<Tool>>, SessionError> {
        self.ensure_ready()?;
        Ok(self.inner.backend.list_tool_categories().await?)
    }

    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    pub fn conversation(&self) -> Option<Conversation> {
        self.lock().conversation.clone()
    }

    pub fn turns(&self) -> Vec<Turn> {
        self.lock()
            .conversation
            .as_ref()
            .map(|conversation| conversation.turns.clone())
            .unwrap_or_default()
    }

    pub fn active_model(&self) -> Option<Model> {
        self.lock()
            .conversation
            .as_ref()
            .map(|conversation| conversation.model.clone())
    }

    pub fn available_models(&self) -> Vec<Model> {
        self.lock().models.clone()
    }

    pub fn available_tools(&self) -> Vec<Tool> {
        self.lock().tools.clone()
    }

    pub fn tools_enabled(&self) -> bool {
        self.lock().options.tools_enabled
    }

    fn ensure_ready(&self) -> Result<(), SessionError> {
        if self.lock().state.is_ready() {
            Ok(())
        } else {
            Err(SessionError::NotReady)
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionData> {
        self.inner
            .data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, conversation: &Conversation) {
        if let Err(err) = self.inner.store.save(conversation) {
            warn!(error = %err, "failed to persist conversation");
        }
    }

    fn restore_or_create(&self, models: &[Model]) -> Conversation {
        match self.inner.store.load() {
            Ok(Some(conversation)) => {
                debug!(
                    id = %conversation.id,
                    turns = conversation.turns.len(),
                    "restored conversation"
                );
                return conversation;
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "ignoring unreadable conversation record"),
        }
        // Callers guarantee a non-empty catalog.
        let model = models.first().cloned().unwrap_or_else(|| Model::new("", "", ""));
        let conversation = Conversation::new(model);
        self.persist(&conversation);
        conversation
    }
}

/// Returns the controller to `Ready(Idle)` once the in-flight request
/// settles, or when the send future is dropped before it does.
struct InFlight<'a> {
    controller: &'a SessionController,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self, result: Result<crate::api::Reply, RequestError>) -> SendOutcome {
        let mut data = self.controller.lock();
        let (turn, outcome) = match result {
            Ok(reply) => (
                Turn::assistant(reply.content, reply.thinking_steps),
                SendOutcome::Answered,
            ),
            Err(err) => {
                warn!(error = %err, detail = ?err.detail(), "converse failed");
                (
                    Turn::assistant(err.user_message(), Vec::new()),
                    SendOutcome::Failed(err),
                )
            }
        };
        if let Some(conversation) = data.conversation.as_mut() {
            conversation.append(turn);
            self.controller.persist(conversation);
        }
        data.state = SessionState::Ready(Activity::Idle);
        self.settled = true;
        outcome
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut data = self.controller.lock();
        if data.state.is_sending() {
            debug!("send abandoned before the answer arrived");
            data.state = SessionState::Ready(Activity::Idle);
        }
    }
}
