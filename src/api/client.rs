use async_trait::async_trait;
use futures_util::future::try_join;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

use crate::api::models::{categories_from_response, models_from_response, tools_from_response};
use crate::api::reply::{
    health_from_body, normalize_reply, normalize_tool_outcome, status_detail,
};
use crate::api::{
    api_history, select_path, AnsweringBackend, Capabilities, ChatRequest, ConversePath,
    ConverseOptions, ModelsResponse, Reply, SimpleChatRequest, ToolCategoriesResponse,
    ToolExecuteRequest, ToolOutcome, ToolsResponse,
};
use crate::core::config::Config;
use crate::core::error::RequestError;
use crate::core::message::{Model, Tool, Turn};
use crate::utils::url::endpoint_url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    /// Applies to catalog, converse and tool calls.
    pub request: Duration,
    /// Applies to the liveness check only.
    pub health: Duration,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(120),
            health: Duration::from_millis(5000),
        }
    }
}

/// HTTP implementation of [`AnsweringBackend`].
pub struct RemoteClient {
    client: Client,
    base_url: String,
    timeouts: ClientTimeouts,
    /// Argument schemas from the last successful discovery, keyed by tool id.
    tool_schemas: RwLock<HashMap<String, Value>>,
}

impl RemoteClient {
    pub fn new(base_url: impl Into<String>, timeouts: ClientTimeouts) -> Result<Self, RequestError> {
        let client = Client::builder()
            .timeout(timeouts.request)
            .build()
            .map_err(|err| RequestError::transport(&err))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            timeouts,
            tool_schemas: RwLock::new(HashMap::new()),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, RequestError> {
        Self::new(
            config.server.api_url.clone(),
            ClientTimeouts {
                request: Duration::from_secs(config.server.request_timeout_secs),
                health: Duration::from_millis(config.server.health_check_timeout_ms),
            },
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &[&str]) -> Result<reqwest::Url, RequestError> {
        endpoint_url(&self.base_url, path).map_err(|detail| RequestError::Transport { detail })
    }

    async fn fetch_models(&self) -> Result<Vec<Model>, RequestError> {
        let response: ModelsResponse = self.get_json(&["models"]).await?;
        Ok(models_from_response(response))
    }

    async fn fetch_tools(&self) -> Result<Vec<Tool>, RequestError> {
        let response: ToolsResponse = self.get_json(&["tools"]).await?;
        Ok(tools_from_response(response))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T, RequestError> {
        let url = self.endpoint(path)?;
        let endpoint = path.join("/");
        let body = send_for_body(self.client.get(url)).await?;
        if body.trim().is_empty() {
            return Err(RequestError::Empty);
        }
        let value: Value = serde_json::from_str(&body).map_err(|err| RequestError::Malformed {
            detail: err.to_string(),
        })?;
        if value.get("error").is_some_and(|error| !error.is_null()) {
            return Err(RequestError::Backend {
                detail: crate::api::reply::extract_error_summary(&value)
                    .unwrap_or_else(|| format!("GET /{endpoint} returned an error payload")),
            });
        }
        serde_json::from_value(value).map_err(|err| RequestError::Malformed {
            detail: format!("GET /{endpoint}: {err}"),
        })
    }

    fn remember_schemas(&self, tools: &[Tool]) {
        let mut schemas = self
            .tool_schemas
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        schemas.clear();
        for tool in tools {
            if !tool.schema.is_null() {
                schemas.insert(tool.id.clone(), tool.schema.clone());
            }
        }
    }

    fn validate_arguments(&self, name: &str, arguments: &Value) -> Result<(), RequestError> {
        let schemas = self
            .tool_schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(parameters) = schemas.get(name).and_then(parameter_schema) else {
            return Ok(());
        };
        let validator = match jsonschema::validator_for(parameters) {
            Ok(validator) => validator,
            Err(err) => {
                debug!(tool = name, error = %err, "ignoring unusable tool schema");
                return Ok(());
            }
        };
        let problems: Vec<String> = validator
            .iter_errors(arguments)
            .map(|err| err.to_string())
            .collect();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(RequestError::InvalidArguments {
                tool: name.to_string(),
                detail: problems.join("; "),
            })
        }
    }
}

#[async_trait]
impl AnsweringBackend for RemoteClient {
    async fn discover_capabilities(&self) -> Result<Capabilities, RequestError> {
        let (models, tools) = try_join(self.fetch_models(), self.fetch_tools()).await?;
        debug!(
            models = models.len(),
            tools = tools.len(),
            "capability discovery finished"
        );
        self.remember_schemas(&tools);
        Ok(Capabilities { models, tools })
    }

    async fn health_check(&self) -> bool {
        let url = match self.endpoint(&["health"]) {
            Ok(url) => url,
            Err(err) => {
                debug!(error = %err, "health check skipped");
                return false;
            }
        };
        let request = self.client.get(url).timeout(self.timeouts.health);
        match send_for_body(request).await {
            Ok(body) => health_from_body(&body),
            Err(err) => {
                debug!(error = %err, detail = ?err.detail(), "health check failed");
                false
            }
        }
    }

    async fn converse(
        &self,
        turns: &[Turn],
        model: &Model,
        options: &ConverseOptions,
    ) -> Result<Reply, RequestError> {
        let history = api_history(turns);
        let path = select_path(&history);
        debug!(?path, turns = history.len(), model = %model.id, "converse");

        let request = match path {
            ConversePath::SingleShot => {
                let message = history
                    .first()
                    .map(|m| m.content.as_str())
                    .unwrap_or_default();
                self.client
                    .post(self.endpoint(&["chat", "simple"])?)
                    .json(&SimpleChatRequest {
                        message,
                        model: &model.id,
                        provider: &model.provider,
                        use_tools: options.tools_enabled,
                        temperature: options.temperature,
                        max_tokens: options.max_tokens,
                    })
            }
            ConversePath::HistoryAware => self
                .client
                .post(self.endpoint(&["chat"])?)
                .json(&ChatRequest {
                    messages: history,
                    model: &model.id,
                    provider: &model.provider,
                    tools_enabled: options.tools_enabled,
                }),
        };

        let body = send_for_body(request).await?;
        normalize_reply(&body).inspect_err(|err| {
            debug!(error = %err, detail = ?err.detail(), "converse response rejected");
        })
    }

    async fn execute_tool(
        &self,
        name: &str,
        arguments: &Value,
    ) -> Result<ToolOutcome, RequestError> {
        self.validate_arguments(name, arguments)?;
        let url = self.endpoint(&["tools", name, "execute"])?;
        let request = self
            .client
            .post(url)
            .json(&ToolExecuteRequest { arguments });
        let body = send_for_body(request).await?;
        normalize_tool_outcome(name, &body)
    }

    async fn list_tool_categories(&self) -> Result<BTreeMap<String, Vec<Tool>>, RequestError> {
        let response: ToolCategoriesResponse = self.get_json(&["tools", "categories"]).await?;
        Ok(categories_from_response(response))
    }
}

/// Send a request and return the body of a success response. Every failure
/// mode comes back as a [`RequestError`].
async fn send_for_body(request: RequestBuilder) -> Result<String, RequestError> {
    let response = request
        .header("Content-Type", "application/json")
        .send()
        .await
        .map_err(|err| RequestError::transport(&err))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| RequestError::transport(&err))?;

    if !status.is_success() {
        let detail = status_detail(&body);
        debug!(status = status.as_u16(), detail = ?detail, "request failed");
        return Err(RequestError::Status {
            status: status.as_u16(),
            detail,
        });
    }
    Ok(body)
}

/// Locate the JSON schema for a tool's arguments. Catalogs carry either an
/// OpenAI-style function definition or a bare object schema.
fn parameter_schema(schema: &Value) -> Option<&Value> {
    let candidate = schema
        .pointer("/function/parameters")
        .or_else(|| schema.get("parameters"))
        .or_else(|| schema.get("inputSchema"))
        .unwrap_or(schema);
    match candidate {
        Value::Object(map) if !map.is_empty() => Some(candidate),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    type CapturedRequests = Arc<Mutex<Vec<(String, Value)>>>;

    struct Canned {
        status: u16,
        body: String,
        delay: Option<Duration>,
    }

    fn canned(status: u16, body: impl Into<String>) -> Canned {
        Canned {
            status,
            body: body.into(),
            delay: None,
        }
    }

    /// Serve one canned reply per route on a local port. A route is matched
    /// by the start of the request line ("POST /chat/simple"), so concurrent
    /// requests may arrive in any order. Returns the base URL and the captured
    /// `(request line, json body)` pairs.
    async fn serve(routes: Vec<(&'static str, Canned)>) -> (String, CapturedRequests) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("local addr should resolve");
        let captured: CapturedRequests = Arc::new(Mutex::new(Vec::new()));
        let captured_for_server = Arc::clone(&captured);

        tokio::spawn(async move {
            let mut routes: Vec<Option<(&'static str, Canned)>> =
                routes.into_iter().map(Some).collect();
            for _ in 0..routes.len() {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let Ok((request_line, body)) = read_http_request(&mut stream).await else {
                    return;
                };
                let json_body = serde_json::from_slice(&body).unwrap_or(Value::Null);
                captured_for_server
                    .lock()
                    .await
                    .push((request_line.clone(), json_body));
                let matched = routes.iter_mut().find(|slot| {
                    slot.as_ref().is_some_and(|(prefix, _)| {
                        request_line.starts_with(&format!("{prefix} "))
                    })
                });
                let reply = matched
                    .and_then(Option::take)
                    .map(|(_, reply)| reply)
                    .unwrap_or_else(|| canned(404, r#"{"error":"no route"}"#));
                if let Some(delay) = reply.delay {
                    tokio::time::sleep(delay).await;
                }
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    reply.status,
                    reply.body.len(),
                    reply.body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (format!("http://{addr}"), captured)
    }

    async fn read_http_request(
        stream: &mut tokio::net::TcpStream,
    ) -> Result<(String, Vec<u8>), String> {
        use tokio::io::AsyncReadExt;

        let mut buffer = Vec::new();
        let mut header_end = None;
        while header_end.is_none() {
            let mut chunk = [0_u8; 1024];
            let read = stream
                .read(&mut chunk)
                .await
                .map_err(|err| err.to_string())?;
            if read == 0 {
                return Err("Unexpected EOF while reading HTTP headers".to_string());
            }
            buffer.extend_from_slice(&chunk[..read]);
            header_end = buffer
                .windows(4)
                .position(|window| window == b"\r\n\r\n")
                .map(|index| index + 4);
        }

        let header_end = header_end.expect("header end should exist");
        let header_text =
            std::str::from_utf8(&buffer[..header_end]).map_err(|err| err.to_string())?;
        let mut lines = header_text.split("\r\n").filter(|line| !line.is_empty());
        let request_line = lines
            .next()
            .ok_or_else(|| "Missing HTTP request line".to_string())?
            .to_string();

        let mut content_length = 0_usize;
        for line in lines {
            let mut parts = line.splitn(2, ':');
            let Some(name) = parts.next() else {
                continue;
            };
            let value = parts.next().unwrap_or_default().trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse::<usize>().map_err(|err| err.to_string())?;
            }
        }

        let mut body = buffer[header_end..].to_vec();
        while body.len() < content_length {
            let mut chunk = vec![0_u8; content_length.saturating_sub(body.len())];
            let read = stream
                .read(&mut chunk)
                .await
                .map_err(|err| err.to_string())?;
            if read == 0 {
                return Err("Unexpected EOF while reading HTTP body".to_string());
            }
            body.extend_from_slice(&chunk[..read]);
        }
        body.truncate(content_length);
        Ok((request_line, body))
    }

    fn client(base_url: &str) -> RemoteClient {
        RemoteClient::new(
            base_url,
            ClientTimeouts {
                request: Duration::from_secs(5),
                health: Duration::from_millis(200),
            },
        )
        .expect("client builds")
    }

    fn model() -> Model {
        Model::new("gpt-4o-mini", "GPT-4o Mini", "openai")
    }

    #[tokio::test]
    async fn first_message_uses_the_simple_endpoint() {
        let (base, captured) = serve(vec![(
            "POST /chat/simple",
            canned(200, r#"{"response":"Hi!","thinking_steps":[{"type":"final_response","title":"Done","content":"","timestamp":"2024-01-01T00:00:00"}]}"#),
        )])
        .await;
        let reply = client(&base)
            .converse(&[Turn::user("Hello")], &model(), &ConverseOptions::default())
            .await
            .expect("reply");
        assert_eq!(reply.content, "Hi!");
        assert_eq!(reply.thinking_steps.len(), 1);

        let captured = captured.lock().await;
        assert!(captured[0].0.starts_with("POST /chat/simple "));
        assert_eq!(captured[0].1["message"], "Hello");
        assert_eq!(captured[0].1["model"], "gpt-4o-mini");
        assert_eq!(captured[0].1["provider"], "openai");
        assert_eq!(captured[0].1["use_tools"], true);
        assert_eq!(captured[0].1["max_tokens"], 1000);
    }

    #[tokio::test]
    async fn follow_up_messages_send_the_full_history() {
        let (base, captured) =
            serve(vec![("POST /chat", canned(200, r#"{"response":{"content":"Sure."}}"#))]).await;
        let turns = vec![
            Turn::user("Hello"),
            Turn::assistant("Hi!", Vec::new()),
            Turn::system("Switched model"),
            Turn::user("Tell me more"),
        ];
        let options = ConverseOptions {
            tools_enabled: false,
            ..ConverseOptions::default()
        };
        let reply = client(&base)
            .converse(&turns, &model(), &options)
            .await
            .expect("reply");
        assert_eq!(reply.content, "Sure.");

        let captured = captured.lock().await;
        assert!(captured[0].0.starts_with("POST /chat "));
        let body = &captured[0].1;
        assert_eq!(body["tools_enabled"], false);
        assert_eq!(
            body["messages"],
            json!([
                {"role": "user", "content": "Hello"},
                {"role": "assistant", "content": "Hi!"},
                {"role": "user", "content": "Tell me more"}
            ])
        );
    }

    #[tokio::test]
    async fn error_statuses_and_payloads_normalize() {
        let (base, _) = serve(vec![
            (
                "POST /chat/simple",
                canned(500, r#"{"error":"Chat generation failed: KeyError"}"#),
            ),
            (
                "POST /chat/simple",
                canned(200, r#"{"error":"Agent not available"}"#),
            ),
            ("POST /chat/simple", canned(200, "")),
        ])
        .await;
        let client = client(&base);
        let turns = [Turn::user("Hello")];
        let options = ConverseOptions::default();

        let first = client.converse(&turns, &model(), &options).await;
        assert!(matches!(
            first,
            Err(RequestError::Status { status: 500, ref detail })
                if detail.as_deref() == Some("Chat generation failed: KeyError")
        ));
        let second = client.converse(&turns, &model(), &options).await;
        assert!(matches!(second, Err(RequestError::Backend { .. })));
        let third = client.converse(&turns, &model(), &options).await;
        assert_eq!(third, Err(RequestError::Empty));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let client = client(&format!("http://{addr}"));
        let result = client
            .converse(&[Turn::user("Hello")], &model(), &ConverseOptions::default())
            .await;
        assert!(matches!(result, Err(RequestError::Transport { .. })));
        assert!(!client.health_check().await);
    }

    #[tokio::test]
    async fn slow_health_check_reads_as_unhealthy() {
        let (base, _) = serve(vec![(
            "GET /health",
            Canned {
                status: 200,
                body: r#"{"status":"healthy"}"#.to_string(),
                delay: Some(Duration::from_millis(800)),
            },
        )])
        .await;
        assert!(!client(&base).health_check().await);
    }

    #[tokio::test]
    async fn healthy_service_reports_status() {
        let (base, captured) = serve(vec![(
            "GET /health",
            canned(200, r#"{"status":"healthy","version":"2.0.0-mcp"}"#),
        )])
        .await;
        assert!(client(&base).health_check().await);
        assert!(captured.lock().await[0].0.starts_with("GET /health "));
    }

    #[tokio::test]
    async fn prefixed_service_urls_reach_every_endpoint() {
        let (base, captured) = serve(vec![
            ("GET /agent/health", canned(200, r#"{"status":"healthy"}"#)),
            (
                "POST /agent/tools/web%20search/execute",
                canned(200, r#"{"success":true,"result":"ok","tool":"web search"}"#),
            ),
        ])
        .await;
        let client = client(&format!("{base}/agent/"));
        assert!(client.health_check().await);
        let outcome = client
            .execute_tool("web search", &json!({"query": "rust"}))
            .await
            .expect("tool result");
        assert_eq!(outcome.result, json!("ok"));

        let captured = captured.lock().await;
        assert!(captured[1].0.starts_with("POST /agent/tools/web%20search/execute "));
    }

    #[tokio::test]
    async fn unusable_service_urls_fail_without_a_request() {
        let client = client("localhost:4090");
        assert!(!client.health_check().await);
        let reply = client
            .converse(&[Turn::user("Hello")], &model(), &ConverseOptions::default())
            .await;
        assert!(matches!(reply, Err(RequestError::Transport { .. })));
    }

    #[tokio::test]
    async fn discovery_fails_when_either_catalog_fails() {
        let (base, _) = serve(vec![
            (
                "GET /models",
                canned(200, r#"{"models":[{"id":"a","name":"A","provider":"openai"}]}"#),
            ),
            ("GET /tools", canned(503, r#"{"error":"Agent not available"}"#)),
        ])
        .await;
        let result = client(&base).discover_capabilities().await;
        assert!(matches!(result, Err(RequestError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn discovery_returns_both_catalogs() {
        let (base, _) = serve(vec![
            (
                "GET /models",
                canned(
                    200,
                    r#"{"models":[{"id":"a","name":"A","provider":"openai"},{"id":"b","name":"B","provider":"gemini"}],"total":2}"#,
                ),
            ),
            (
                "GET /tools",
                canned(
                    200,
                    r#"{"tools":[{"id":"calculate","name":"Calculate","description":"math","category":"Math","icon":"🧮","schema":{}}],"total":1}"#,
                ),
            ),
        ])
        .await;
        let caps = client(&base)
            .discover_capabilities()
            .await
            .expect("capabilities");
        assert_eq!(caps.models.len(), 2);
        assert_eq!(caps.models[0].id, "a");
        assert_eq!(caps.tools.len(), 1);
        assert_eq!(caps.tools[0].category, "Math");
    }

    #[tokio::test]
    async fn tool_arguments_are_checked_against_the_cached_schema() {
        let (base, captured) = serve(vec![
            ("GET /models", canned(200, r#"{"models":[{"id":"a"}]}"#)),
            (
                "GET /tools",
                canned(
                    200,
                    r#"{"tools":[{"id":"calculate","schema":{"type":"function","function":{"name":"calculate","parameters":{"type":"object","properties":{"expression":{"type":"string"}},"required":["expression"]}}}}]}"#,
                ),
            ),
            (
                "POST /tools/calculate/execute",
                canned(200, r#"{"success":true,"result":{"value":4},"tool":"calculate"}"#),
            ),
        ])
        .await;
        let client = client(&base);
        client.discover_capabilities().await.expect("capabilities");

        let invalid = client.execute_tool("calculate", &json!({"expr": 1})).await;
        assert!(matches!(
            invalid,
            Err(RequestError::InvalidArguments { ref tool, .. }) if tool == "calculate"
        ));

        let outcome = client
            .execute_tool("calculate", &json!({"expression": "2+2"}))
            .await
            .expect("tool result");
        assert_eq!(outcome.result, json!({"value": 4}));

        let captured = captured.lock().await;
        let executed: Vec<_> = captured
            .iter()
            .filter(|(line, _)| line.starts_with("POST /tools/calculate/execute "))
            .collect();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].1, json!({"arguments": {"expression": "2+2"}}));
    }

    #[tokio::test]
    async fn tool_categories_accept_the_wrapped_shape() {
        let (base, _) = serve(vec![(
            "GET /tools/categories",
            canned(200, r#"{"categories":{"Web":[{"id":"open_page"}],"Math":[{"id":"calculate"}]},"total_categories":2,"total_tools":2}"#),
        )])
        .await;
        let categories = client(&base)
            .list_tool_categories()
            .await
            .expect("categories");
        assert_eq!(
            categories.keys().cloned().collect::<Vec<_>>(),
            vec!["Math".to_string(), "Web".to_string()]
        );
    }

    #[test]
    fn parameter_schema_finds_nested_definitions() {
        let function = json!({"function": {"parameters": {"type": "object"}}});
        assert_eq!(parameter_schema(&function), Some(&json!({"type": "object"})));
        assert_eq!(parameter_schema(&json!({})), None);
        assert_eq!(parameter_schema(&json!({"type": "object"})), Some(&json!({"type": "object"})));
    }
}
