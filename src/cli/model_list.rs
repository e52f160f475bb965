//! Model listing functionality
//!
//! This module lists the models the answering service offers.

use std::error::Error;

use crate::api::{AnsweringBackend, RemoteClient};
use crate::cli::conversation_store;
use crate::core::config::Config;
use crate::core::message::Model;
use tracing::warn;

pub async fn list_models(config: &Config) -> Result<(), Box<dyn Error>> {
    let client = RemoteClient::from_config(config)?;
    let capabilities = client.discover_capabilities().await?;

    // The saved conversation's model is marked, when there is one.
    let active = match conversation_store(config).load() {
        Ok(conversation) => conversation.map(|conversation| conversation.model.id),
        Err(err) => {
            warn!(error = %err, "could not read the saved conversation");
            None
        }
    };

    println!("🤖 Available Models at {}", client.base_url());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    if capabilities.models.is_empty() {
        println!("No models found.");
        return Ok(());
    }

    println!("Found {} models:", capabilities.models.len());
    println!();
    for line in format_models(&capabilities.models, active.as_deref()) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn format_models(models: &[Model], active: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    for model in models {
        let marker = if active == Some(model.id.as_str()) {
            " 🎯 (active)"
        } else {
            ""
        };
        lines.push(format!("  • {}{marker}", model.id));
        if !model.name.is_empty() && model.name != model.id {
            lines.push(format!("    Name: {}", model.name));
        }
        if !model.provider.is_empty() {
            lines.push(format!("    Provider: {}", model.provider));
        }
        if let Some(description) = model.description.as_deref().filter(|d| !d.is_empty()) {
            lines.push(format!("    {description}"));
        }
        lines.push(String::new());
    }
    lines
}
