use crate::core::config::data::{path_display, Config};
use std::path::Path;

impl Config {
    pub fn print_all(&self, config_path: Option<&Path>) {
        match config_path {
            Some(path) => println!("Current configuration ({}):", path_display(path)),
            None => println!("Current configuration (no config directory):"),
        }
        println!("  server.api-url: {}", self.server.api_url);
        println!(
            "  server.health-check-timeout: {} ms",
            self.server.health_check_timeout_ms
        );
        println!(
            "  server.health-check-interval: {} s",
            self.server.health_check_interval_secs
        );
        println!(
            "  server.request-timeout: {} s",
            self.server.request_timeout_secs
        );
        println!("  chat.temperature: {}", self.chat.temperature);
        println!("  chat.max-tokens: {}", self.chat.max_tokens);
        println!("  chat.tools: {}", on_off(self.chat.tools_enabled));
        println!("  ui.show-thinking: {}", on_off(self.ui.show_thinking));
        println!("  ui.syntax: {}", on_off(self.ui.syntax));
        match self.data_dir() {
            Some(dir) => println!("  storage.data-dir: {}", path_display(dir)),
            None => println!("  storage.data-dir: (unavailable)"),
        }
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}
