//! MCP transport: JSON-RPC 2.0 over authenticated HTTP.
//!
//! `Connector::connect` performs the `initialize` handshake and hands back a
//! ready `ToolSession`; `ToolSession::invoke` issues `tools/call`.
//! There is no retry: failures surface to the caller as-is.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{McpError, ToolInvocation, ToolResult};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SESSION_HEADER: &str = "mcp-session-id";
/// Error bodies are truncated to this many bytes before being surfaced.
const MAX_ERROR_BODY: usize = 500;

/// An authenticated, endpoint-scoped connection.
#[async_trait]
pub trait ToolSession: Send + Sync {
    async fn invoke(&self, invocation: ToolInvocation) -> Result<ToolResult, McpError>;
}

/// Establishes sessions. Swappable so the facade can be exercised without a network.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        endpoint_url: &str,
        credential: &str,
        client_name: &str,
    ) -> Result<Arc<dyn ToolSession>, McpError>;
}

/// The production connector: streamable-HTTP MCP servers.
#[derive(Clone)]
pub struct HttpConnector {
    client: Client,
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(
        &self,
        endpoint_url: &str,
        credential: &str,
        client_name: &str,
    ) -> Result<Arc<dyn ToolSession>, McpError> {
        info!("Connecting to MCP server at {endpoint_url} as {client_name}");

        let body = rpc_request(
            1,
            "initialize",
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": client_name,
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        );

        let response = self
            .client
            .post(endpoint_url)
            .bearer_auth(credential)
            .header("accept", "application/json, text/event-stream")
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| McpError::connection(endpoint_url, format!("unreachable: {e}")))?;

        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let status = response.status();
        let content_type = content_type_of(&response);
        let text = response
            .text()
            .await
            .map_err(|e| McpError::connection(endpoint_url, e.to_string()))?;

        if !status.is_success() {
            return Err(McpError::connection(
                endpoint_url,
                format!("handshake returned HTTP {status}: {}", truncate(&text)),
            ));
        }

        let reply = decode_rpc_body(&content_type, &text)
            .map_err(|e| McpError::connection(endpoint_url, e))?;

        if let Some(error) = reply.get("error") {
            return Err(McpError::connection(
                endpoint_url,
                format!("handshake rejected: {}", rpc_error_message(error)),
            ));
        }
        if reply.get("result").is_none() {
            return Err(McpError::connection(
                endpoint_url,
                "handshake reply has no result",
            ));
        }

        let server = reply
            .pointer("/result/serverInfo/name")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let version = reply
            .pointer("/result/protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        debug!("MCP server {server} speaks protocol {version}");

        let session = HttpSession {
            client: self.client.clone(),
            url: endpoint_url.to_string(),
            credential: credential.to_string(),
            session_id,
            timeout: self.timeout,
            next_id: AtomicU64::new(2),
        };

        // The handshake is only complete once the server has seen `initialized`.
        let ack = session
            .post(&json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
            .send()
            .await
            .map_err(|e| McpError::connection(endpoint_url, format!("unreachable: {e}")))?;
        if !ack.status().is_success() {
            return Err(McpError::connection(
                endpoint_url,
                format!("initialized notification returned HTTP {}", ack.status()),
            ));
        }

        info!("Connected to MCP server at {endpoint_url}");
        Ok(Arc::new(session))
    }
}

struct HttpSession {
    client: Client,
    url: String,
    credential: String,
    session_id: Option<String>,
    timeout: Duration,
    next_id: AtomicU64,
}

impl HttpSession {
    fn post(&self, body: &Value) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .post(&self.url)
            .bearer_auth(&self.credential)
            .header("accept", "application/json, text/event-stream")
            .timeout(self.timeout)
            .json(body);
        if let Some(id) = &self.session_id {
            request = request.header(SESSION_HEADER, id);
        }
        request
    }
}

#[async_trait]
impl ToolSession for HttpSession {
    async fn invoke(&self, invocation: ToolInvocation) -> Result<ToolResult, McpError> {
        let ToolInvocation {
            tool_name,
            arguments,
        } = invocation;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("Calling MCP tool {tool_name} on {} (id {id})", self.url);

        let fail = |message: String, payload: Option<Value>| McpError::Invocation {
            tool: tool_name.clone(),
            message,
            payload,
        };

        let body = rpc_request(
            id,
            "tools/call",
            json!({ "name": tool_name, "arguments": arguments }),
        );

        let response = self
            .post(&body)
            .send()
            .await
            .map_err(|e| fail(format!("unreachable: {e}"), None))?;

        let status = response.status();
        let content_type = content_type_of(&response);
        let text = response
            .text()
            .await
            .map_err(|e| fail(e.to_string(), None))?;

        if !status.is_success() {
            let payload = serde_json::from_str::<Value>(&text).ok();
            return Err(fail(
                format!("HTTP {status}: {}", truncate(&text)),
                payload,
            ));
        }

        let reply = decode_rpc_body(&content_type, &text).map_err(|e| fail(e, None))?;
        parse_tool_reply(reply).map_err(|(message, payload)| fail(message, payload))
    }
}

fn rpc_request(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    })
}

fn content_type_of(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json")
        .to_string()
}

/// Decodes a JSON-RPC reply from either a plain JSON body or an SSE stream,
/// in which case the first `data:` event carrying a `result` or `error` wins.
fn decode_rpc_body(content_type: &str, body: &str) -> Result<Value, String> {
    if !content_type.contains("text/event-stream") {
        return serde_json::from_str(body)
            .map_err(|e| format!("response is not valid JSON: {e}"));
    }

    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str::<Value>(data.trim()).ok())
        .find(|msg| msg.get("result").is_some() || msg.get("error").is_some())
        .ok_or_else(|| "event stream carried no JSON-RPC reply".to_string())
}

/// Turns a decoded `tools/call` reply into a `ToolResult`, or a message and
/// the endpoint's error payload.
fn parse_tool_reply(reply: Value) -> Result<ToolResult, (String, Option<Value>)> {
    if let Some(error) = reply.get("error") {
        return Err((rpc_error_message(error), Some(error.clone())));
    }

    let result = reply
        .get("result")
        .cloned()
        .ok_or_else(|| ("reply has no result".to_string(), None))?;

    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let parsed: ToolResult = serde_json::from_value(result.clone())
        .map_err(|e| (format!("malformed tool result: {e}"), Some(result.clone())))?;

    if is_error {
        let message = match parsed.text() {
            t if t.is_empty() => "tool reported an error".to_string(),
            t => t,
        };
        return Err((message, Some(result)));
    }

    Ok(parsed)
}

fn rpc_error_message(error: &Value) -> String {
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    match error.get("code").and_then(Value::as_i64) {
        Some(code) => format!("error {code}: {message}"),
        None => message.to_string(),
    }
}

fn truncate(s: &str) -> &str {
    if s.len() <= MAX_ERROR_BODY {
        return s;
    }
    let mut end = MAX_ERROR_BODY;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_json_body() {
        let reply = decode_rpc_body(
            "application/json",
            r#"{"jsonrpc":"2.0","id":1,"result":{}}"#,
        )
        .unwrap();
        assert_eq!(reply["id"], 1);
    }

    #[test]
    fn test_decode_event_stream_skips_notifications() {
        let body = "event: message\n\
                    data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\n\n\
                    event: message\n\
                    data: {\"jsonrpc\":\"2.0\",\"id\":3,\"result\":{\"content\":[]}}\n\n";
        let reply = decode_rpc_body("text/event-stream; charset=utf-8", body).unwrap();
        assert_eq!(reply["id"], 3);
    }

    #[test]
    fn test_decode_invalid_json_is_error() {
        assert!(decode_rpc_body("application/json", "<html>").is_err());
        assert!(decode_rpc_body("text/event-stream", "data: nope\n").is_err());
    }

    #[test]
    fn test_parse_tool_reply_success_keeps_order() {
        let reply = json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": {
                "content": [
                    {"type": "text", "text": "task created"},
                    {"type": "text", "text": "id: 86"}
                ]
            }
        });
        let result = parse_tool_reply(reply).unwrap();
        assert_eq!(result.content.len(), 2);
        assert_eq!(result.content[0].text, "task created");
        assert_eq!(result.content[1].text, "id: 86");
    }

    #[test]
    fn test_parse_tool_reply_rpc_error_carries_payload() {
        let reply = json!({
            "jsonrpc": "2.0",
            "id": 2,
            "error": {"code": -32602, "message": "Unknown tool: create_tsak"}
        });
        let (message, payload) = parse_tool_reply(reply).unwrap_err();
        assert_eq!(message, "error -32602: Unknown tool: create_tsak");
        assert_eq!(payload.unwrap()["code"], -32602);
    }

    #[test]
    fn test_parse_tool_reply_is_error_flag() {
        let reply = json!({
            "result": {
                "isError": true,
                "content": [{"type": "text", "text": "list not found"}]
            }
        });
        let (message, payload) = parse_tool_reply(reply).unwrap_err();
        assert_eq!(message, "list not found");
        assert_eq!(payload.unwrap()["isError"], true);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let long = "é".repeat(400);
        let cut = truncate(&long);
        assert!(cut.len() <= MAX_ERROR_BODY);
        assert!(long.starts_with(cut));
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_endpoint_is_connection_error() {
        let connector = HttpConnector::new(Client::new(), Duration::from_secs(2));
        // Port 9 (discard) on localhost is never an HTTP server in test environments.
        let err = connector
            .connect("http://127.0.0.1:9/mcp", "token", "hrbuddy-test")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, McpError::Connection { .. }));
    }

    mod stub {
        use axum::{
            http::{header::AUTHORIZATION, HeaderMap, StatusCode},
            response::{IntoResponse, Response},
            routing::post,
            Json, Router,
        };
        use serde_json::{json, Value};

        use super::super::{PROTOCOL_VERSION, SESSION_HEADER};

        pub const TOKEN: &str = "good-token";

        /// A minimal MCP server: accepts `TOKEN`, assigns session `S1`, knows
        /// only `create_task` and echoes the session id and arguments back.
        async fn handle(headers: HeaderMap, Json(body): Json<Value>) -> Response {
            let bearer = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
            if bearer != Some(&format!("Bearer {TOKEN}")[..]) {
                return (StatusCode::UNAUTHORIZED, "nope").into_response();
            }
            let id = body["id"].clone();
            match body["method"].as_str() {
                Some("initialize") => (
                    [(SESSION_HEADER, "S1")],
                    Json(json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "result": {
                            "protocolVersion": PROTOCOL_VERSION,
                            "serverInfo": {"name": "stub"}
                        }
                    })),
                )
                    .into_response(),
                Some("notifications/initialized") => StatusCode::ACCEPTED.into_response(),
                Some("tools/call") if body["params"]["name"] == "create_task" => {
                    let sid = headers
                        .get(SESSION_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("none");
                    let text = format!("sid={sid} args={}", body["params"]["arguments"]);
                    Json(json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "result": {"content": [{"type": "text", "text": text}]}
                    }))
                    .into_response()
                }
                _ => Json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {"code": -32602, "message": "Unknown tool"}
                }))
                .into_response(),
            }
        }

        /// Serves the stub on an ephemeral port and returns its URL.
        pub async fn spawn() -> String {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let app = Router::new().route("/mcp", post(handle));
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{addr}/mcp")
        }
    }

    fn connector() -> HttpConnector {
        HttpConnector::new(Client::new(), Duration::from_secs(5))
    }

    fn create_task_invocation(tool_name: &str) -> ToolInvocation {
        let mut arguments = serde_json::Map::new();
        arguments.insert("list_id".to_string(), json!("L1"));
        ToolInvocation {
            tool_name: tool_name.to_string(),
            arguments,
        }
    }

    #[tokio::test]
    async fn test_rejected_credential_is_connection_error() {
        let url = stub::spawn().await;
        let err = connector()
            .connect(&url, "wrong-token", "hrbuddy-test")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, McpError::Connection { .. }));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_invoke_echoes_session_id_and_returns_content() {
        let url = stub::spawn().await;
        let session = connector()
            .connect(&url, stub::TOKEN, "hrbuddy-test")
            .await
            .unwrap();

        let result = session
            .invoke(create_task_invocation("create_task"))
            .await
            .unwrap();

        assert_eq!(result.content.len(), 1);
        assert_eq!(result.content[0].kind, "text");
        assert_eq!(result.content[0].text, r#"sid=S1 args={"list_id":"L1"}"#);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_invocation_error_with_payload() {
        let url = stub::spawn().await;
        let session = connector()
            .connect(&url, stub::TOKEN, "hrbuddy-test")
            .await
            .unwrap();

        let err = session
            .invoke(create_task_invocation("create_tsak"))
            .await
            .unwrap_err();

        match err {
            McpError::Invocation {
                tool,
                message,
                payload,
            } => {
                assert_eq!(tool, "create_tsak");
                assert_eq!(message, "error -32602: Unknown tool");
                let payload = payload.unwrap();
                assert_eq!(payload["code"], -32602);
                assert_eq!(payload["message"], "Unknown tool");
            }
            other => panic!("expected invocation error, got {other:?}"),
        }
    }
}
