//! Remote answering service contract.
//!
//! Everything the backend sends is loosely typed JSON; this module is the only
//! place that sees it. Payloads are validated and coerced into the domain
//! types from [`crate::core::message`] before they leave here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::core::error::RequestError;
use crate::core::message::{Model, ThinkingStep, Tool, Turn};

pub mod client;
pub mod models;
pub mod reply;

pub use client::{ClientTimeouts, RemoteClient};

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Body of `POST /chat/simple`.
#[derive(Serialize, Debug)]
pub struct SimpleChatRequest<'a> {
    pub message: &'a str,
    pub model: &'a str,
    pub provider: &'a str,
    pub use_tools: bool,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Body of `POST /chat`.
#[derive(Serialize, Debug)]
pub struct ChatRequest<'a> {
    pub messages: Vec<ChatMessage>,
    pub model: &'a str,
    pub provider: &'a str,
    pub tools_enabled: bool,
}

/// Body of `POST /tools/{name}/execute`.
#[derive(Serialize, Debug)]
pub struct ToolExecuteRequest<'a> {
    pub arguments: &'a Value,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ModelInfo {
    #[serde(default)]
    pub id: String,
    pub name: Option<String>,
    pub provider: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ToolInfo {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub icon: Option<String>,
    pub schema: Option<Value>,
}

/// `GET /models` answers either `{ "models": [...] }` or a bare list.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum ModelsResponse {
    Wrapped { models: Vec<ModelInfo> },
    Bare(Vec<ModelInfo>),
}

/// `GET /tools` answers either `{ "tools": [...] }` or a bare list.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum ToolsResponse {
    Wrapped { tools: Vec<ToolInfo> },
    Bare(Vec<ToolInfo>),
}

/// `GET /tools/categories` answers either `{ "categories": {...} }` or a bare map.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum ToolCategoriesResponse {
    Wrapped {
        categories: BTreeMap<String, Vec<ToolInfo>>,
    },
    Bare(BTreeMap<String, Vec<ToolInfo>>),
}

/// What the session needs before it can be used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capabilities {
    pub models: Vec<Model>,
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConverseOptions {
    pub tools_enabled: bool,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ConverseOptions {
    fn default() -> Self {
        Self {
            tools_enabled: true,
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

/// Normalized assistant answer, identical for both converse paths.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub content: String,
    pub thinking_steps: Vec<ThinkingStep>,
}

/// Result of a direct tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub tool: String,
    pub result: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversePath {
    /// Exactly one user turn and no history.
    SingleShot,
    HistoryAware,
}

/// Turns the backend is allowed to see, in order.
pub fn api_history(turns: &[Turn]) -> Vec<ChatMessage> {
    turns
        .iter()
        .filter_map(|turn| {
            turn.role.to_api_role().map(|role| ChatMessage {
                role: role.to_string(),
                content: turn.content.clone(),
            })
        })
        .collect()
}

pub fn select_path(history: &[ChatMessage]) -> ConversePath {
    match history {
        [only] if only.role == "user" => ConversePath::SingleShot,
        _ => ConversePath::HistoryAware,
    }
}

/// The seam between the session controller and the remote service.
#[async_trait]
pub trait AnsweringBackend: Send + Sync {
    /// Fetch the model and tool catalogs. Both must succeed.
    async fn discover_capabilities(&self) -> Result<Capabilities, RequestError>;

    /// Advisory liveness check; failures read as `false`.
    async fn health_check(&self) -> bool;

    async fn converse(
        &self,
        turns: &[Turn],
        model: &Model,
        options: &ConverseOptions,
    ) -> Result<Reply, RequestError>;

    async fn execute_tool(&self, name: &str, arguments: &Value)
        -> Result<ToolOutcome, RequestError>;

    async fn list_tool_categories(&self) -> Result<BTreeMap<String, Vec<Tool>>, RequestError>;
}
