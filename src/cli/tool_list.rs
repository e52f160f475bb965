//! Tool listing grouped by category

use std::collections::BTreeMap;
use std::error::Error;

use crate::api::{AnsweringBackend, RemoteClient};
use crate::core::config::Config;
use crate::core::message::Tool;
use tracing::warn;

pub async fn list_tools(config: &Config) -> Result<(), Box<dyn Error>> {
    let client = RemoteClient::from_config(config)?;

    let categories = match client.list_tool_categories().await {
        Ok(categories) if !categories.is_empty() => categories,
        Ok(_) => group_by_category(client.discover_capabilities().await?.tools),
        Err(err) => {
            warn!(error = %err, "tool categories unavailable; grouping the tool catalog");
            group_by_category(client.discover_capabilities().await?.tools)
        }
    };

    println!("🔧 Tools at {}", client.base_url());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    if categories.is_empty() {
        println!("No tools found.");
        return Ok(());
    }
    for line in format_categories(&categories) {
        println!("{line}");
    }
    Ok(())
}

fn group_by_category(tools: Vec<Tool>) -> BTreeMap<String, Vec<Tool>> {
    let mut categories: BTreeMap<String, Vec<Tool>> = BTreeMap::new();
    for tool in tools {
        let category = if tool.category.trim().is_empty() {
            "general".to_string()
        } else {
            tool.category.clone()
        };
        categories.entry(category).or_default().push(tool);
    }
    categories
}

pub(crate) fn format_categories(categories: &BTreeMap<String, Vec<Tool>>) -> Vec<String> {
    let mut lines = Vec::new();
    for (category, tools) in categories {
        lines.push(format!("📂 {category} ({})", tools.len()));
        for tool in tools {
            let icon = if tool.icon.is_empty() { "•" } else { tool.icon.as_str() };
            if tool.description.is_empty() {
                lines.push(format!("  {icon} {}", tool.name));
            } else {
                lines.push(format!("  {icon} {} - {}", tool.name, tool.description));
            }
        }
    }
    lines
}
