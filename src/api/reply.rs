//! Response-body normalization shared by both converse paths, the health
//! check and direct tool calls.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::api::{Reply, ToolOutcome};
use crate::core::error::RequestError;
use crate::core::message::ThinkingStep;

const UNKNOWN_STEP_KIND: &str = "unknown";

/// Parse a converse body. `{response: "text"}` and `{response: {content}}`
/// both produce the same `Reply`.
pub fn normalize_reply(body: &str) -> Result<Reply, RequestError> {
    let value = parse_body(body)?;
    reject_error_payload(&value)?;

    let content = match value.get("response") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Object(map)) => match map.get("content") {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => {
                return Err(RequestError::Malformed {
                    detail: format!("response.content is {}", json_kind(other)),
                })
            }
        },
        Some(Value::Null) | None => String::new(),
        Some(other) => {
            return Err(RequestError::Malformed {
                detail: format!("response is {}", json_kind(other)),
            })
        }
    };

    if content.trim().is_empty() {
        return Err(RequestError::Empty);
    }

    Ok(Reply {
        content,
        thinking_steps: normalize_thinking_steps(value.get("thinking_steps")),
    })
}

/// Parse a direct tool-call body.
pub fn normalize_tool_outcome(tool: &str, body: &str) -> Result<ToolOutcome, RequestError> {
    let value = parse_body(body)?;
    reject_error_payload(&value)?;

    if value.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(RequestError::Backend {
            detail: format!("tool {tool} reported failure"),
        });
    }

    let result = match value.get("result") {
        Some(result) => result.clone(),
        None => value,
    };
    Ok(ToolOutcome {
        tool: tool.to_string(),
        result,
    })
}

/// Interpret a `/health` body that came back with a success status.
pub fn health_from_body(body: &str) -> bool {
    // Plain-text bodies ("OK") carry no flag; the status code already said yes.
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return true;
    };
    if let Some(healthy) = value.get("healthy").and_then(Value::as_bool) {
        return healthy;
    }
    match value.get("status") {
        Some(Value::String(status)) => matches!(
            status.to_ascii_lowercase().as_str(),
            "healthy" | "ok" | "up" | "pass"
        ),
        Some(Value::Bool(flag)) => *flag,
        Some(_) => false,
        None => value.get("error").is_none(),
    }
}

/// Coerce a `thinking_steps` array. Non-object entries are skipped; missing
/// fields take neutral defaults. Order is kept exactly as reported.
pub fn normalize_thinking_steps(value: Option<&Value>) -> Vec<ThinkingStep> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|step| ThinkingStep {
            kind: step
                .get("type")
                .or_else(|| step.get("kind"))
                .and_then(Value::as_str)
                .filter(|kind| !kind.trim().is_empty())
                .unwrap_or(UNKNOWN_STEP_KIND)
                .to_string(),
            title: step
                .get("title")
                .map(text_of)
                .unwrap_or_default(),
            content: step
                .get("content")
                .map(text_of)
                .unwrap_or_default(),
            timestamp: step
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(parse_timestamp)
                .unwrap_or_else(Utc::now),
            duration_ms: step.get("duration_ms").and_then(duration_of),
            metadata: match step.get("metadata") {
                Some(Value::Object(map)) => map
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                _ => BTreeMap::new(),
            },
        })
        .collect()
}

/// Short summary of an error payload, for logs.
pub fn extract_error_summary(value: &Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                Value::String(s) => Some(s.to_string()),
                Value::Object(map) => map
                    .get("message")
                    .and_then(|message| message.as_str().map(str::to_owned)),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.trim().to_string()
    })
}

/// Summary of a failed response body for `RequestError::Status`.
pub fn status_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|value| extract_error_summary(&value))
        .or_else(|| Some(trimmed.chars().take(200).collect()))
}

fn parse_body(body: &str) -> Result<Value, RequestError> {
    if body.trim().is_empty() {
        return Err(RequestError::Empty);
    }
    serde_json::from_str(body).map_err(|err| RequestError::Malformed {
        detail: err.to_string(),
    })
}

fn reject_error_payload(value: &Value) -> Result<(), RequestError> {
    if !value.is_object() {
        return Err(RequestError::Malformed {
            detail: format!("body is {}", json_kind(value)),
        });
    }
    match value.get("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(()),
        Some(_) => Err(RequestError::Backend {
            detail: extract_error_summary(value).unwrap_or_else(|| "error payload".to_string()),
        }),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    // Naive ISO-8601 (no offset) is read as UTC.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn duration_of(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|ms| ms.is_finite() && *ms >= 0.0)
                .map(|ms| ms.round() as u64)
        }),
        _ => None,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
