//! One-shot "say" command

use std::error::Error;
use std::sync::Arc;

use crate::cli::chat::format_answer;
use crate::cli::{connection_problem, open_session, switch_to_requested_model};
use crate::core::config::Config;
use crate::core::session::SendOutcome;
use crate::core::store::MemoryStore;

pub async fn run_say(
    config: &Config,
    prompt: Vec<String>,
    model: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        return Err("Usage: palaver say <prompt>".into());
    }

    // One-shot questions never touch the saved conversation.
    let session = open_session(config, Arc::new(MemoryStore::new())).await?;
    if let Some(problem) = connection_problem(&session, &config.server.api_url) {
        return Err(problem.into());
    }
    if let Some(model) = model {
        switch_to_requested_model(&session, model)?;
    }

    match session.send_message(&prompt).await {
        SendOutcome::Answered => {
            let turns = session.turns();
            if let Some(answer) = turns.iter().rev().find(|turn| turn.is_assistant()) {
                for line in format_answer(answer, config.ui.show_thinking) {
                    println!("{line}");
                }
            }
            Ok(())
        }
        SendOutcome::Failed(err) => Err(format!("Error: {err}").into()),
        SendOutcome::Ignored(reason) => Err(format!("The message was not sent ({reason:?})").into()),
    }
}
