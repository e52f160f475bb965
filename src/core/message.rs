use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TurnRole {
    User,
    Assistant,
    System,
}

impl TurnRole {
    pub fn as_str(self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
            TurnRole::System => "system",
        }
    }

    /// Role as sent to the backend. System notifications are local to the
    /// transcript and never transmitted.
    pub fn to_api_role(self) -> Option<&'static str> {
        match self {
            TurnRole::User => Some("user"),
            TurnRole::Assistant => Some("assistant"),
            TurnRole::System => None,
        }
    }

    pub fn is_user(self) -> bool {
        self == TurnRole::User
    }

    pub fn is_assistant(self) -> bool {
        self == TurnRole::Assistant
    }
}

impl AsRef<str> for TurnRole {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<&str> for TurnRole {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(TurnRole::User),
            "assistant" => Ok(TurnRole::Assistant),
            "system" => Ok(TurnRole::System),
            _ => Err(format!("invalid turn role: {value}")),
        }
    }
}

impl TryFrom<String> for TurnRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<TurnRole> for String {
    fn from(value: TurnRole) -> Self {
        value.as_str().to_string()
    }
}

/// One disclosed unit of the backend's reasoning or tool-use trace.
///
/// `kind` is an open vocabulary; the display layer maps the known tags and
/// falls back to a generic presentation for anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingStep {
    pub kind: String,
    pub title: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub name: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Model {
    pub fn new(id: impl Into<String>, name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            provider: provider.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A tool advertised by the backend's tool catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub icon: String,
    pub schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thinking_steps: Vec<ThinkingStep>,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            thinking_steps: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    pub fn assistant(content: impl Into<String>, thinking_steps: Vec<ThinkingStep>) -> Self {
        let mut turn = Self::new(TurnRole::Assistant, content);
        turn.thinking_steps = thinking_steps;
        turn
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(TurnRole::System, content)
    }

    pub fn is_user(&self) -> bool {
        self.role.is_user()
    }

    pub fn is_assistant(&self) -> bool {
        self.role.is_assistant()
    }
}

/// One conversation: ordered turns plus the single active model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub turns: Vec<Turn>,
    pub model: Model,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(model: Model) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            turns: Vec::new(),
            model,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.touch();
    }

    pub fn set_model(&mut self, model: Model) {
        self.model = model;
        self.touch();
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.touch();
    }

    pub fn last_user_turn(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|turn| turn.is_user())
    }

    pub fn last_assistant_turn(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|turn| turn.is_assistant())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_turns_are_not_sent_to_the_api() {
        assert_eq!(TurnRole::System.to_api_role(), None);
        assert_eq!(TurnRole::User.to_api_role(), Some("user"));
        assert_eq!(TurnRole::Assistant.to_api_role(), Some("assistant"));
    }

    #[test]
    fn invalid_role_strings_are_rejected() {
        assert!(TurnRole::try_from("tool/result").is_err());
        let parsed: Result<Turn, _> = serde_json::from_str(
            r#"{"id":"a","role":"narrator","content":"x","timestamp":"2024-01-01T00:00:00Z"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn turn_ids_are_unique() {
        let a = Turn::user("one");
        let b = Turn::user("one");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn clear_keeps_identity_and_model() {
        let mut conversation = Conversation::new(Model::new("m1", "Model One", "openai"));
        let id = conversation.id.clone();
        conversation.append(Turn::user("hello"));
        conversation.clear();
        assert!(conversation.turns.is_empty());
        assert_eq!(conversation.id, id);
        assert_eq!(conversation.model.id, "m1");
    }

    #[test]
    fn last_turn_lookups_skip_other_roles() {
        let mut conversation = Conversation::new(Model::new("m1", "Model One", "openai"));
        conversation.append(Turn::user("first"));
        conversation.append(Turn::assistant("answer", Vec::new()));
        conversation.append(Turn::system("Switched model"));
        assert_eq!(
            conversation.last_user_turn().map(|t| t.content.as_str()),
            Some("first")
        );
        assert_eq!(
            conversation.last_assistant_turn().map(|t| t.content.as_str()),
            Some("answer")
        );
    }
}
