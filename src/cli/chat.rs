//! Line-oriented chat REPL over stdin.
//!
//! Network work runs in spawned tasks that report back over a channel, so
//! the loop keeps reading input while an answer is pending. A message typed
//! meanwhile reaches the session, which drops it as busy.

use std::collections::BTreeMap;
use std::error::Error;
use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::api::ToolOutcome;
use crate::cli::tool_list::format_categories;
use crate::cli::{connection_problem, conversation_store, open_session, switch_to_requested_model};
use crate::commands::{format_sources, process_input, ChatContext, CommandResult};
use crate::core::config::Config;
use crate::core::error::SessionError;
use crate::core::health::HealthMonitor;
use crate::core::message::{Tool, Turn};
use crate::core::session::{IgnoreReason, SendOutcome, SessionState};
use crate::ui::markdown::extract_citations;
use crate::ui::thinking::ThinkingDisclosure;
use crate::utils::logging::TranscriptLog;

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Result of a spawned network task.
#[derive(Debug)]
enum Background {
    Answer { before: usize, outcome: SendOutcome },
    Tool {
        name: String,
        result: Result<ToolOutcome, SessionError>,
    },
    Categories(Result<BTreeMap<String, Vec<Tool>>, SessionError>),
    Reconnected(SessionState),
}

type Jobs = mpsc::UnboundedSender<Background>;

pub async fn run_chat(
    config: &Config,
    model: Option<&str>,
    log: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let session = open_session(config, conversation_store(config)).await?;
    let transcript = TranscriptLog::new(log)?;
    let mut ctx = ChatContext::new(session, transcript, config.server.api_url.clone());
    ctx.show_thinking = config.ui.show_thinking;

    match connection_problem(&ctx.session, &ctx.api_url) {
        None => {
            if let Some(model) = model {
                switch_to_requested_model(&ctx.session, model)?;
            }
            print_banner(&ctx);
        }
        Some(problem) => {
            ctx.requested_model = model.map(str::to_string);
            println!("⚠️  {problem}");
            println!("   Type /reconnect to try again, /quit to leave.");
        }
    }

    let monitor = HealthMonitor::spawn(ctx.session.backend(), config.health_check_interval());
    let mut health_rx = monitor.subscribe();
    let mut watching_health = true;

    let (jobs, mut results) = mpsc::unbounded_channel();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    println!();
                    break;
                };
                if handle_line(&mut ctx, &line, &jobs)? == Flow::Quit {
                    break;
                }
            }
            Some(event) = results.recv() => {
                for line in describe(&mut ctx, event) {
                    println!("{line}");
                }
            }
            changed = health_rx.changed(), if watching_health => {
                if changed.is_err() {
                    watching_health = false;
                    continue;
                }
                let current = *health_rx.borrow_and_update();
                if let Some(message) = health_transition(ctx.health, current) {
                    println!("\n{message}");
                    if current == Some(true) && !ctx.session.state().is_ready() {
                        println!("   Type /reconnect to connect.");
                    }
                }
                if current.is_some() {
                    ctx.health = current;
                }
            }
        }
    }

    drop(monitor);
    Ok(())
}

fn print_banner(ctx: &ChatContext) {
    let model = ctx
        .session
        .active_model()
        .map(|model| format!("{} ({})", model.name, model.provider))
        .unwrap_or_else(|| "no model".to_string());
    println!("💬 Connected to {} using {model}", ctx.api_url);
    let restored = ctx.session.turns().len();
    if restored > 0 {
        println!("   Restored {restored} earlier turns. /clear starts over.");
    }
    println!("   Type /help for commands, /quit to leave.");
}

fn spawn_job<F>(jobs: &Jobs, job: F)
where
    F: Future<Output = Background> + Send + 'static,
{
    let jobs = jobs.clone();
    tokio::spawn(async move {
        // The receiver is gone only when the REPL has exited.
        let _ = jobs.send(job.await);
    });
}

fn handle_line(ctx: &mut ChatContext, line: &str, jobs: &Jobs) -> Result<Flow, Box<dyn Error>> {
    if line.trim().is_empty() {
        return Ok(Flow::Continue);
    }
    let result = process_input(ctx, line);
    for output in ctx.take_output() {
        println!("{output}");
    }

    let session = ctx.session.clone();
    match result {
        CommandResult::Continue => {}
        CommandResult::ProcessAsMessage(text) => {
            let before = session.turns().len();
            spawn_job(jobs, async move {
                let outcome = session.send_message(&text).await;
                Background::Answer { before, outcome }
            });
        }
        CommandResult::Retry => {
            let before = session.turns().len();
            spawn_job(jobs, async move {
                let outcome = session.retry_last().await;
                Background::Answer { before, outcome }
            });
        }
        CommandResult::ExecuteTool { name, arguments } => spawn_job(jobs, async move {
            let result = session.execute_tool(&name, &arguments).await;
            Background::Tool { name, result }
        }),
        CommandResult::ShowCategories => spawn_job(jobs, async move {
            Background::Categories(session.tool_categories().await)
        }),
        CommandResult::Reconnect => spawn_job(jobs, async move {
            Background::Reconnected(session.initialize().await)
        }),
        CommandResult::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

/// Terminal lines for a finished background task.
fn describe(ctx: &mut ChatContext, event: Background) -> Vec<String> {
    match event {
        Background::Answer { before, outcome } => answer_lines(ctx, before, &outcome),
        Background::Tool { name, result } => match result {
            Ok(outcome) => {
                let pretty = serde_json::to_string_pretty(&outcome.result)
                    .unwrap_or_else(|_| outcome.result.to_string());
                let mut lines = vec![format!("🔧 {}:", outcome.tool)];
                lines.extend(pretty.lines().map(str::to_string));
                lines
            }
            Err(err) => vec![format!("❌ Tool '{name}' failed: {err}")],
        },
        Background::Categories(result) => match result {
            Ok(categories) => format_categories(&categories),
            Err(err) => vec![format!("❌ Could not list tool categories: {err}")],
        },
        Background::Reconnected(state) => reconnect_lines(ctx, &state),
    }
}

fn answer_lines(ctx: &ChatContext, before: usize, outcome: &SendOutcome) -> Vec<String> {
    match outcome {
        SendOutcome::Answered | SendOutcome::Failed(_) => {
            ctx.log_turns_from(before);
            let turns = ctx.session.turns();
            turns
                .iter()
                .skip(before)
                .rev()
                .find(|turn| turn.is_assistant())
                .map(|answer| format_answer(answer, ctx.show_thinking))
                .unwrap_or_default()
        }
        SendOutcome::Ignored(reason) => ignored_message(*reason)
            .map(|message| vec![message.to_string()])
            .unwrap_or_default(),
    }
}

fn reconnect_lines(ctx: &mut ChatContext, state: &SessionState) -> Vec<String> {
    match state {
        SessionState::Ready(_) => {
            let mut lines = Vec::new();
            if let Some(requested) = ctx.requested_model.take() {
                let before = ctx.session.turns().len();
                match switch_to_requested_model(&ctx.session, &requested) {
                    Ok(()) => ctx.log_turns_from(before),
                    Err(message) => lines.push(format!("❌ {message}")),
                }
            }
            let model = ctx
                .session
                .active_model()
                .map(|model| format!("{} ({})", model.name, model.provider))
                .unwrap_or_else(|| "no model".to_string());
            lines.insert(0, format!("✅ Connected to {} using {model}", ctx.api_url));
            lines
        }
        SessionState::ConnectionFailed { diagnostic } => vec![
            format!("⚠️  Could not connect to {}: {diagnostic}", ctx.api_url),
            "   Type /reconnect to try again.".to_string(),
        ],
        SessionState::Uninitialized | SessionState::Connecting => Vec::new(),
    }
}

fn ignored_message(reason: IgnoreReason) -> Option<&'static str> {
    match reason {
        IgnoreReason::EmptyInput => None,
        IgnoreReason::NotReady => Some("⚠️  Not connected; the message was not sent. Try /reconnect."),
        IgnoreReason::Busy => Some("⏳ Still waiting for the previous answer; that message was dropped."),
        IgnoreReason::NothingToRetry => Some("Nothing to retry yet."),
    }
}

/// The answer text, its numbered sources, then the thinking steps.
pub(crate) fn format_answer(turn: &Turn, show_thinking: bool) -> Vec<String> {
    let mut lines: Vec<String> = turn.content.lines().map(str::to_string).collect();

    let citations = extract_citations(&turn.content);
    if !citations.is_empty() {
        lines.push(String::new());
        lines.push("Sources:".to_string());
        lines.extend(format_sources(&citations));
    }

    let disclosure = ThinkingDisclosure::from_steps(&turn.thinking_steps);
    if show_thinking && !disclosure.is_empty() {
        lines.push(String::new());
        lines.push("Thinking steps:".to_string());
        lines.extend(disclosure.expanded_listing().lines().map(str::to_string));
    } else if let Some(summary) = disclosure.summary_line() {
        lines.push(String::new());
        lines.push(summary);
    }
    lines
}

/// Message for a liveness change worth telling the user about.
fn health_transition(previous: Option<bool>, current: Option<bool>) -> Option<&'static str> {
    match (previous, current) {
        (Some(true) | None, Some(false)) => Some("⚠️  The answering service is not responding."),
        (Some(false), Some(true)) => Some("✅ The answering service is reachable again."),
        _ => None,
    }
}
