//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod history;
pub mod model_list;
pub mod render;
pub mod say;
pub mod tool_list;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{debug, warn};

use crate::api::RemoteClient;
use crate::cli::chat::run_chat;
use crate::cli::history::print_history;
use crate::cli::model_list::list_models;
use crate::cli::render::render_file;
use crate::cli::say::run_say;
use crate::cli::tool_list::list_tools;
use crate::core::config::{path_display, Config, API_URL_ENV};
use crate::core::session::{SessionController, SessionState};
use crate::core::store::{ConversationStore, FileStore, MemoryStore};

#[derive(Parser)]
#[command(name = "palaver")]
#[command(version)]
#[command(about = "A terminal chat client for a tool-using answering service")]
#[command(
    long_about = "Palaver connects to an answering service over HTTP, keeps one persistent \
conversation, and prints answers with their numbered sources and a collapsed trace of \
the service's thinking steps.\n\n\
Environment Variables:\n\
  PALAVER_API_URL   Base URL of the answering service (overridden by --api-url)\n\
  PALAVER_LOG       Diagnostic log filter, e.g. \"debug\" (default: warn)\n\n\
Chat commands:\n\
  /help             List every slash command\n\
  /model <id>       Switch models\n\
  /sources          Show the sources of the last answer\n\
  /steps            Expand the thinking steps of the last answer\n\
  /log <filename>   Log the transcript to a file\n\
  /quit             Leave the chat"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Base URL of the answering service
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Model to use for chat
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Enable logging to specified file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Send messages without tool use
    #[arg(long, global = true)]
    pub no_tools: bool,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start the chat REPL (default)
    Chat,
    /// Ask one question and print the answer
    Say {
        /// The question; multiple words are joined with spaces
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// List the models the service offers
    Models,
    /// List the service's tools by category
    Tools,
    /// Render assistant markup from a file (or "-" for stdin) as HTML
    Render {
        /// File to render
        file: PathBuf,
    },
    /// Print the saved conversation
    History,
    /// Print the effective configuration
    Config {
        /// Save the effective configuration to the config file
        #[arg(long)]
        write: bool,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config_path = Config::get_config_path();
    let config = effective_config(
        &args,
        Config::load_or_default(config_path.as_deref()),
        std::env::var(API_URL_ENV).ok(),
    );
    debug!(api_url = %config.server.api_url, "configuration loaded");

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(&config, args.model.as_deref(), args.log).await,
        Commands::Say { prompt } => run_say(&config, prompt, args.model.as_deref()).await,
        Commands::Models => list_models(&config).await,
        Commands::Tools => list_tools(&config).await,
        Commands::Render { file } => render_file(&config, &file),
        Commands::History => print_history(&config),
        Commands::Config { write } => {
            if write {
                let path = config_path
                    .as_deref()
                    .ok_or("No config directory available on this platform")?;
                config.save_to_path(path)?;
                println!("✅ Saved configuration to {}", path_display(path));
            }
            config.print_all(config_path.as_deref());
            Ok(())
        }
    }
}

/// Layer environment and flag overrides over the loaded file.
fn effective_config(args: &Args, mut config: Config, env_api_url: Option<String>) -> Config {
    config.apply_overrides(env_api_url, args.api_url.as_deref());
    if args.no_tools {
        config.chat.tools_enabled = false;
    }
    config
}

/// The on-disk store under the data directory, or an in-memory one when the
/// platform has no data directory.
pub(crate) fn conversation_store(config: &Config) -> Arc<dyn ConversationStore> {
    match config.data_dir() {
        Some(dir) => Arc::new(FileStore::new(dir)),
        None => {
            warn!("no data directory available; the conversation will not be saved");
            Arc::new(MemoryStore::new())
        }
    }
}

/// Build a session for the configured service and try to connect it. A
/// failed connection is left in the session state for the caller to report
/// and retry.
pub(crate) async fn open_session(
    config: &Config,
    store: Arc<dyn ConversationStore>,
) -> Result<SessionController, Box<dyn Error>> {
    let client = RemoteClient::from_config(config)?;
    let session = SessionController::new(
        Arc::new(client),
        store,
        config.converse_options(config.chat.tools_enabled),
    );
    let state = session.initialize().await;
    debug!(state = state.label(), "session opened");
    Ok(session)
}

/// Why `session` is not usable, when it is not.
pub(crate) fn connection_problem(session: &SessionController, api_url: &str) -> Option<String> {
    match session.state() {
        SessionState::ConnectionFailed { diagnostic } => {
            Some(format!("Could not connect to {api_url}: {diagnostic}"))
        }
        SessionState::Ready(_) => None,
        other => Some(format!("Not connected to {api_url} ({})", other.label())),
    }
}

/// Switch to the model asked for with `-m`, unless it is already active.
pub(crate) fn switch_to_requested_model(
    session: &SessionController,
    requested: &str,
) -> Result<(), String> {
    let requested = requested.trim();
    if requested.is_empty() {
        return Ok(());
    }
    let already_active = session
        .active_model()
        .is_some_and(|active| active.id.eq_ignore_ascii_case(requested));
    if already_active || session.change_model_by_id(requested).is_some() {
        return Ok(());
    }
    let known: Vec<String> = session
        .available_models()
        .into_iter()
        .map(|model| model.id)
        .collect();
    Err(format!(
        "Unknown model '{requested}'. Available models: {}",
        known.join(", ")
    ))
}
