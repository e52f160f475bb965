//! Slash commands of the chat REPL.
//!
//! Handlers are synchronous: anything that needs the network is returned as a
//! [`CommandResult`] for the REPL to await.

mod registry;

pub use registry::{all_commands, find_command, CommandInvocation};

use crate::core::message::Turn;
use crate::core::session::SessionController;
use crate::ui::markdown::{extract_citations, Citation};
use crate::ui::thinking::ThinkingDisclosure;
use crate::utils::logging::TranscriptLog;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, PartialEq)]
pub enum CommandResult {
    Continue,
    ProcessAsMessage(String),
    Retry,
    ExecuteTool { name: String, arguments: Value },
    ShowCategories,
    Reconnect,
    Quit,
}

/// State the REPL shares with command handlers.
pub struct ChatContext {
    pub session: SessionController,
    pub transcript: TranscriptLog,
    pub api_url: String,
    pub show_thinking: bool,
    /// Last liveness value reported to the user.
    pub health: Option<bool>,
    /// Model asked for on the command line, applied once connected.
    pub requested_model: Option<String>,
    output: Vec<String>,
}

impl ChatContext {
    pub fn new(session: SessionController, transcript: TranscriptLog, api_url: String) -> Self {
        Self {
            session,
            transcript,
            api_url,
            show_thinking: false,
            health: None,
            requested_model: None,
            output: Vec::new(),
        }
    }

    pub fn say(&mut self, line: impl Into<String>) {
        self.output.push(line.into());
    }

    /// Lines queued by handlers since the last call.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Append turns from index `from` onward to the transcript log.
    pub fn log_turns_from(&self, from: usize) {
        if !self.transcript.is_active() {
            return;
        }
        for turn in self.session.turns().iter().skip(from) {
            if let Err(err) = self.transcript.log_turn(turn) {
                warn!(error = %err, "failed to write transcript log");
                break;
            }
        }
    }

    fn last_answer(&self) -> Option<Turn> {
        self.session
            .conversation()
            .and_then(|conversation| conversation.last_assistant_turn().cloned())
    }
}

pub fn process_input(ctx: &mut ChatContext, input: &str) -> CommandResult {
    let trimmed = input.trim();

    let Some(rest) = trimmed.strip_prefix('/') else {
        return CommandResult::ProcessAsMessage(input.to_string());
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return CommandResult::ProcessAsMessage(input.to_string()),
    };
    let args = parts.next().unwrap_or("").trim();

    if let Some(command) = find_command(command_name) {
        let invocation = CommandInvocation {
            input: trimmed,
            args,
        };
        (command.handler)(ctx, invocation)
    } else {
        CommandResult::ProcessAsMessage(input.to_string())
    }
}

/// Terminal lines for a citation list, one per source.
pub fn format_sources(citations: &[Citation]) -> Vec<String> {
    citations
        .iter()
        .map(|citation| {
            if citation.domain.is_empty() || citation.title == citation.domain {
                format!("  [{}] {} <{}>", citation.number, citation.title, citation.url)
            } else {
                format!(
                    "  [{}] {} ({}) <{}>",
                    citation.number, citation.title, citation.domain, citation.url
                )
            }
        })
        .collect()
}

pub(super) fn handle_help(ctx: &mut ChatContext, _invocation: CommandInvocation<'_>) -> CommandResult {
    ctx.say("Commands:");
    for command in all_commands() {
        ctx.say(format!("  {:<26} {}", command.usage, command.help));
    }
    ctx.say("Anything else is sent to the assistant.");
    CommandResult::Continue
}

pub(super) fn handle_models(ctx: &mut ChatContext, _invocation: CommandInvocation<'_>) -> CommandResult {
    let active = ctx.session.active_model().map(|model| model.id);
    let models = ctx.session.available_models();
    if models.is_empty() {
        ctx.say("No models available.");
        return CommandResult::Continue;
    }
    for model in models {
        let marker = if active.as_deref() == Some(model.id.as_str()) {
            "*"
        } else {
            " "
        };
        let mut line = format!("{marker} {} - {} ({})", model.id, model.name, model.provider);
        if let Some(description) = model.description.as_deref().filter(|d| !d.is_empty()) {
            line.push_str(": ");
            line.push_str(description);
        }
        ctx.say(line);
    }
    CommandResult::Continue
}

pub(super) fn handle_model(ctx: &mut ChatContext, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        match ctx.session.active_model() {
            Some(model) => ctx.say(format!(
                "Current model: {} ({}, {})",
                model.name, model.id, model.provider
            )),
            None => ctx.say("No model selected yet."),
        }
        return CommandResult::Continue;
    }

    if ctx.session.state().is_sending() {
        ctx.say("⏳ Wait for the current answer before switching models.");
        return CommandResult::Continue;
    }
    let before = ctx.session.turns().len();
    match ctx.session.change_model_by_id(invocation.args) {
        Some(model) => {
            ctx.log_turns_from(before);
            ctx.say(format!("Switched model to {} ({})", model.name, model.provider));
        }
        None => ctx.say(format!(
            "Unknown model '{}'. Use /models to list them.",
            invocation.args
        )),
    }
    CommandResult::Continue
}

pub(super) fn handle_clear(ctx: &mut ChatContext, _invocation: CommandInvocation<'_>) -> CommandResult {
    if ctx.session.state().is_sending() {
        ctx.say("⏳ Wait for the current answer before clearing the chat.");
        return CommandResult::Continue;
    }
    if ctx.session.clear_chat() {
        if ctx.transcript.is_active() {
            if let Err(err) = ctx.transcript.log_note("Chat cleared") {
                warn!(error = %err, "failed to write transcript log");
            }
        }
        ctx.say("Chat cleared.");
    } else {
        ctx.say("Nothing to clear yet.");
    }
    CommandResult::Continue
}

pub(super) fn handle_tools(ctx: &mut ChatContext, _invocation: CommandInvocation<'_>) -> CommandResult {
    ctx.say(if ctx.session.toggle_tools() {
        "Tools enabled for the next messages."
    } else {
        "Tools disabled for the next messages."
    });
    CommandResult::Continue
}

pub(super) fn handle_categories(
    _ctx: &mut ChatContext,
    _invocation: CommandInvocation<'_>,
) -> CommandResult {
    CommandResult::ShowCategories
}

pub(super) fn handle_tool(ctx: &mut ChatContext, invocation: CommandInvocation<'_>) -> CommandResult {
    let mut parts = invocation.args.splitn(2, char::is_whitespace);
    let Some(name) = parts.next().filter(|name| !name.is_empty()) else {
        ctx.say("Usage: /tool <name> [json-args]");
        return CommandResult::Continue;
    };
    let raw = parts.next().unwrap_or("").trim();
    let arguments = if raw.is_empty() {
        Value::Object(Default::default())
    } else {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => value,
            Err(err) => {
                ctx.say(format!("Tool arguments must be JSON: {err}"));
                return CommandResult::Continue;
            }
        }
    };
    CommandResult::ExecuteTool {
        name: name.to_string(),
        arguments,
    }
}

pub(super) fn handle_retry(_ctx: &mut ChatContext, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::Retry
}

pub(super) fn handle_steps(ctx: &mut ChatContext, _invocation: CommandInvocation<'_>) -> CommandResult {
    let disclosure = ctx
        .last_answer()
        .map(|turn| ThinkingDisclosure::from_steps(&turn.thinking_steps))
        .unwrap_or_default();
    if disclosure.is_empty() {
        ctx.say("No thinking steps for the last answer.");
    } else {
        for line in disclosure.expanded_listing().lines() {
            ctx.say(line);
        }
    }
    CommandResult::Continue
}

pub(super) fn handle_sources(ctx: &mut ChatContext, _invocation: CommandInvocation<'_>) -> CommandResult {
    let citations = ctx
        .last_answer()
        .map(|turn| extract_citations(&turn.content))
        .unwrap_or_default();
    if citations.is_empty() {
        ctx.say("The last answer cites no sources.");
    } else {
        ctx.say("Sources:");
        for line in format_sources(&citations) {
            ctx.say(line);
        }
    }
    CommandResult::Continue
}

pub(super) fn handle_status(ctx: &mut ChatContext, _invocation: CommandInvocation<'_>) -> CommandResult {
    let state = ctx.session.state();
    ctx.say(format!("Backend: {} ({})", ctx.api_url, state.label()));
    let health = match ctx.health {
        Some(true) => "healthy",
        Some(false) => "not responding",
        None => "unknown",
    };
    ctx.say(format!("Health: {health}"));
    if let Some(model) = ctx.session.active_model() {
        ctx.say(format!("Model: {} ({})", model.name, model.id));
    }
    ctx.say(format!(
        "Tools: {}",
        if ctx.session.tools_enabled() { "on" } else { "off" }
    ));
    ctx.say(format!("Turns: {}", ctx.session.turns().len()));
    let log_status = ctx.transcript.get_status_string();
    ctx.say(format!("Log: {log_status}"));
    CommandResult::Continue
}

pub(super) fn handle_reconnect(
    ctx: &mut ChatContext,
    _invocation: CommandInvocation<'_>,
) -> CommandResult {
    if ctx.session.state().is_sending() {
        ctx.say("⏳ Wait for the current answer before reconnecting.");
        return CommandResult::Continue;
    }
    ctx.say(format!("Connecting to {}...", ctx.api_url));
    CommandResult::Reconnect
}

pub(super) fn handle_log(ctx: &mut ChatContext, invocation: CommandInvocation<'_>) -> CommandResult {
    let message = if invocation.args.is_empty() {
        match ctx.transcript.toggle_logging("Logging paused") {
            Ok(message) => message,
            Err(err) => err,
        }
    } else {
        match ctx.transcript.set_log_file(invocation.args.into()) {
            Ok(message) => message,
            Err(err) => format!("Log error: {err}"),
        }
    };
    ctx.say(message);
    CommandResult::Continue
}

pub(super) fn handle_quit(_ctx: &mut ChatContext, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::Quit
}
