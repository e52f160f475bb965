//! Catalog normalization: wire `ModelInfo`/`ToolInfo` into domain types.
//!
//! Catalog order is preserved; the first model is the session default.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::api::{ModelInfo, ModelsResponse, ToolCategoriesResponse, ToolInfo, ToolsResponse};
use crate::core::message::{Model, Tool};

const DEFAULT_PROVIDER: &str = "unknown";
const DEFAULT_TOOL_CATEGORY: &str = "General";
const DEFAULT_TOOL_ICON: &str = "🔧";

pub fn models_from_response(response: ModelsResponse) -> Vec<Model> {
    let infos = match response {
        ModelsResponse::Wrapped { models } => models,
        ModelsResponse::Bare(models) => models,
    };
    infos.into_iter().filter_map(model_from_info).collect()
}

pub fn tools_from_response(response: ToolsResponse) -> Vec<Tool> {
    let infos = match response {
        ToolsResponse::Wrapped { tools } => tools,
        ToolsResponse::Bare(tools) => tools,
    };
    infos.into_iter().filter_map(tool_from_info).collect()
}

pub fn categories_from_response(response: ToolCategoriesResponse) -> BTreeMap<String, Vec<Tool>> {
    let raw = match response {
        ToolCategoriesResponse::Wrapped { categories } => categories,
        ToolCategoriesResponse::Bare(categories) => categories,
    };
    raw.into_iter()
        .map(|(category, infos)| {
            let tools = infos
                .into_iter()
                .filter_map(tool_from_info)
                .map(|mut tool| {
                    tool.category = category.clone();
                    tool
                })
                .collect();
            (category, tools)
        })
        .collect()
}

/// Entries without an id cannot be selected later, so they are dropped.
fn model_from_info(info: ModelInfo) -> Option<Model> {
    let id = info.id.trim().to_string();
    if id.is_empty() {
        return None;
    }
    let name = info
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| format_model_name(&id));
    let provider = info
        .provider
        .filter(|provider| !provider.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());
    Some(Model {
        id,
        name,
        provider,
        description: info.description.filter(|d| !d.trim().is_empty()),
    })
}

fn tool_from_info(info: ToolInfo) -> Option<Tool> {
    let id = info
        .id
        .or_else(|| info.name.clone())
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())?;
    Some(Tool {
        name: info.name.unwrap_or_else(|| format_model_name(&id)),
        description: info.description.unwrap_or_default(),
        category: info
            .category
            .unwrap_or_else(|| DEFAULT_TOOL_CATEGORY.to_string()),
        icon: info.icon.unwrap_or_else(|| DEFAULT_TOOL_ICON.to_string()),
        schema: info.schema.unwrap_or(Value::Null),
        id,
    })
}

/// Readable fallback for catalog entries that only carry an id:
/// `gemini-2.5-flash` becomes `Gemini 2.5 Flash`.
pub fn format_model_name(id: &str) -> String {
    id.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            if part.eq_ignore_ascii_case("gpt") {
                return "GPT".to_string();
            }
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
