use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::ConverseOptions;

pub const DEFAULT_API_URL: &str = "http://localhost:4090";

/// Environment variable that overrides `server.api_url`.
pub const API_URL_ENV: &str = "PALAVER_API_URL";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the answering service
    pub api_url: String,
    /// Timeout for a single liveness check
    pub health_check_timeout_ms: u64,
    /// Interval between background liveness checks
    pub health_check_interval_secs: u64,
    /// Timeout for catalog, converse and tool requests
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            health_check_timeout_ms: 5000,
            health_check_interval_secs: 30,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Initial value of the session's tool flag
    pub tools_enabled: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        let options = ConverseOptions::default();
        Self {
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            tools_enabled: options.tools_enabled,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    /// Print the expanded step trace after every answer
    pub show_thinking: bool,
    /// Enable syntax highlighting for fenced code blocks
    pub syntax: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_thinking: false,
            syntax: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the persisted conversation; the platform data
    /// directory when unset
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub chat: ChatConfig,
    pub ui: UiConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Options for the next converse call, with the session's current tool flag.
    pub fn converse_options(&self, tools_enabled: bool) -> ConverseOptions {
        ConverseOptions {
            tools_enabled,
            temperature: self.chat.temperature,
            max_tokens: self.chat.max_tokens,
        }
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.server.health_check_interval_secs.max(1))
    }

    /// Apply `PALAVER_API_URL`, then an explicit flag value. Blank values are
    /// ignored.
    pub fn apply_overrides(&mut self, env_api_url: Option<String>, flag_api_url: Option<&str>) {
        let chosen = flag_api_url
            .map(str::to_string)
            .or(env_api_url)
            .filter(|url| !url.trim().is_empty());
        if let Some(url) = chosen {
            self.server.api_url = url.trim().to_string();
        }
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
