use super::{ChatContext, CommandResult};

pub type CommandHandler = fn(&mut ChatContext, CommandInvocation<'_>) -> CommandResult;

pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    pub handler: CommandHandler,
}

#[derive(Clone, Copy)]
pub struct CommandInvocation<'a> {
    pub input: &'a str,
    pub args: &'a str,
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands()
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
        .or_else(|| {
            // "/exit" is accepted alongside "/quit".
            name.eq_ignore_ascii_case("exit")
                .then(|| all_commands().iter().find(|c| c.name == "quit"))
                .flatten()
        })
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        usage: "/help",
        help: "Show available commands.",
        handler: super::handle_help,
    },
    Command {
        name: "models",
        usage: "/models",
        help: "List the models the backend offers.",
        handler: super::handle_models,
    },
    Command {
        name: "model",
        usage: "/model <id>",
        help: "Switch the active model, or show it when no id is given.",
        handler: super::handle_model,
    },
    Command {
        name: "clear",
        usage: "/clear",
        help: "Remove every turn from the conversation.",
        handler: super::handle_clear,
    },
    Command {
        name: "tools",
        usage: "/tools",
        help: "Toggle tool use for the next messages.",
        handler: super::handle_tools,
    },
    Command {
        name: "categories",
        usage: "/categories",
        help: "List tools grouped by category.",
        handler: super::handle_categories,
    },
    Command {
        name: "tool",
        usage: "/tool <name> [json-args]",
        help: "Run one tool directly with JSON arguments.",
        handler: super::handle_tool,
    },
    Command {
        name: "retry",
        usage: "/retry",
        help: "Send the last message again.",
        handler: super::handle_retry,
    },
    Command {
        name: "steps",
        usage: "/steps",
        help: "Expand the thinking steps of the last answer.",
        handler: super::handle_steps,
    },
    Command {
        name: "sources",
        usage: "/sources",
        help: "List the sources cited by the last answer.",
        handler: super::handle_sources,
    },
    Command {
        name: "status",
        usage: "/status",
        help: "Show connection, model, tool and logging status.",
        handler: super::handle_status,
    },
    Command {
        name: "reconnect",
        usage: "/reconnect",
        help: "Connect to the backend again and refresh its catalogs.",
        handler: super::handle_reconnect,
    },
    Command {
        name: "log",
        usage: "/log [file]",
        help: "Log the transcript to a file, or pause/resume logging.",
        handler: super::handle_log,
    },
    Command {
        name: "quit",
        usage: "/quit",
        help: "Leave the chat.",
        handler: super::handle_quit,
    },
];
