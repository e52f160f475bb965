//! Print the saved conversation

use std::error::Error;

use crate::core::config::{path_display, Config};
use crate::core::message::{Conversation, TurnRole};
use crate::core::store::{ConversationStore, FileStore};
use crate::ui::thinking::ThinkingDisclosure;

pub fn print_history(config: &Config) -> Result<(), Box<dyn Error>> {
    let Some(dir) = config.data_dir() else {
        return Err("No data directory is available on this platform.".into());
    };
    let store = FileStore::new(dir);
    match store.load()? {
        Some(conversation) => {
            for line in format_history(&conversation) {
                println!("{line}");
            }
        }
        None => println!(
            "No saved conversation at {}",
            path_display(store.path())
        ),
    }
    Ok(())
}

pub(crate) fn format_history(conversation: &Conversation) -> Vec<String> {
    let mut lines = vec![
        format!(
            "📜 Conversation {} with {} ({})",
            conversation.id, conversation.model.name, conversation.model.provider
        ),
        format!(
            "   Started {}, updated {}",
            conversation.created_at.format("%Y-%m-%d %H:%M UTC"),
            conversation.updated_at.format("%Y-%m-%d %H:%M UTC")
        ),
    ];
    if conversation.turns.is_empty() {
        lines.push("   (no turns)".to_string());
        return lines;
    }
    for turn in &conversation.turns {
        lines.push(String::new());
        let time = turn.timestamp.format("%H:%M");
        match turn.role {
            TurnRole::User => lines.push(format!("[{time}] You:")),
            TurnRole::Assistant => lines.push(format!("[{time}] Assistant:")),
            TurnRole::System => {
                lines.push(format!("[{time}] ## {}", turn.content));
                continue;
            }
        }
        lines.extend(turn.content.lines().map(|line| format!("  {line}")));
        if let Some(summary) = ThinkingDisclosure::from_steps(&turn.thinking_steps).summary_line() {
            lines.push(format!("  {summary}"));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{Model, Turn};
    use crate::utils::test_utils::create_test_step;

    #[test]
    fn turns_are_listed_by_role() {
        let mut conversation = Conversation::new(Model::new("m1", "Model One", "acme"));
        conversation.append(Turn::user("hi"));
        conversation.append(Turn::assistant(
            "hello\nthere",
            vec![create_test_step("reasoning", "think", Some(10))],
        ));
        conversation.append(Turn::system("Switched model to X (y)"));

        let lines = format_history(&conversation);
        assert!(lines[0].ends_with("with Model One (acme)"));
        let body: Vec<&str> = lines[2..]
            .iter()
            .map(|line| line.split_once("] ").map_or(line.as_str(), |(_, rest)| rest))
            .collect();
        assert_eq!(
            body,
            vec![
                "",
                "You:",
                "  hi",
                "",
                "Assistant:",
                "  hello",
                "  there",
                "  ▸ Thinking: 1 step, 10 ms (/steps to expand)",
                "",
                "## Switched model to X (y)",
            ]
        );
    }

    #[test]
    fn empty_conversation_says_so() {
        let conversation = Conversation::new(Model::new("m1", "Model One", "acme"));
        assert_eq!(format_history(&conversation).last().unwrap(), "   (no turns)");
    }
}
