//! In-process stand-ins for the tool process and the model.

use crate::mcp::{McpConnector, McpResult, McpSession};
use crate::traits::{ChatMessage, ChatRequest, ChatResponse, Provider, ToolCall};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Speaks just enough MCP over a duplex pipe to exercise the client.
#[derive(Clone)]
pub(crate) struct FakeServer {
    tools: Vec<Value>,
    page_size: Option<usize>,
    calls: Arc<Mutex<Vec<Value>>>,
}

impl FakeServer {
    pub(crate) fn filesystem() -> Self {
        Self::with_tools(vec![
            json!({
                "name": "list_directory",
                "description": "List the entries of a directory",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "Directory to list"}
                    },
                    "required": ["path"]
                }
            }),
            json!({
                "name": "read_file",
                "description": "Read a file",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "path": {"type": "string"},
                        "head": {"type": "number", "description": "Only the first N lines"}
                    },
                    "required": ["path"]
                }
            }),
        ])
    }

    pub(crate) fn with_tools(tools: Vec<Value>) -> Self {
        Self {
            tools,
            page_size: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub(crate) fn recorded_calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns an uninitialized session wired to a fresh server task.
    pub(crate) fn start(&self) -> McpSession {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (client_read, client_write) = tokio::io::split(client);
        let (server_read, mut server_write) = tokio::io::split(server);

        let this = self.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(server_read).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let Ok(request) = serde_json::from_str::<Value>(&line) else {
                    continue;
                };
                let Some(reply) = this.respond(&request) else {
                    continue;
                };
                let mut payload = reply.to_string();
                payload.push('\n');
                if server_write.write_all(payload.as_bytes()).await.is_err() {
                    break;
                }
            }
        });

        McpSession::from_streams(client_read, client_write, Duration::from_secs(5))
    }

    fn respond(&self, request: &Value) -> Option<Value> {
        let id = request.get("id")?.clone();
        let params = request.get("params").cloned().unwrap_or(Value::Null);
        let method = request.get("method").and_then(Value::as_str).unwrap_or("");

        let result = match method {
            "initialize" => json!({
                "protocolVersion": params["protocolVersion"],
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "fake-filesystem", "version": "0.1.0"}
            }),
            "tools/list" => self.tools_page(params["cursor"].as_str()),
            "tools/call" => {
                self.calls.lock().unwrap().push(json!({
                    "name": params["name"],
                    "arguments": params.get("arguments").cloned().unwrap_or(json!({})),
                }));
                match params["name"].as_str() {
                    Some("list_directory") => json!({
                        "content": [
                            {"type": "text", "text": "[FILE] Cargo.toml"},
                            {"type": "text", "text": "[DIR] src"}
                        ]
                    }),
                    Some("read_file") => json!({
                        "content": [{"type": "text", "text": "ENOENT: no such file or directory"}],
                        "isError": true
                    }),
                    _ => {
                        return Some(json!({
                            "jsonrpc": "2.0",
                            "id": id,
                            "error": {"code": -32602, "message": "Unknown tool"}
                        }));
                    }
                }
            }
            _ => {
                return Some(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {"code": -32601, "message": "Method not found"}
                }));
            }
        };

        Some(json!({"jsonrpc": "2.0", "id": id, "result": result}))
    }

    fn tools_page(&self, cursor: Option<&str>) -> Value {
        let Some(page_size) = self.page_size else {
            return json!({"tools": self.tools});
        };
        let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (start + page_size).min(self.tools.len());
        let mut page = json!({"tools": self.tools[start..end]});
        if end < self.tools.len() {
            page["nextCursor"] = json!(end.to_string());
        }
        page
    }
}

pub(crate) struct FakeConnector {
    server: FakeServer,
}

impl FakeConnector {
    pub(crate) fn new(server: FakeServer) -> Self {
        Self { server }
    }

    pub(crate) fn filesystem() -> Self {
        Self::new(FakeServer::filesystem())
    }

    pub(crate) fn recorded_calls(&self) -> Vec<Value> {
        self.server.recorded_calls()
    }
}

#[async_trait]
impl McpConnector for FakeConnector {
    async fn connect(&self) -> McpResult<McpSession> {
        let session = self.server.start();
        session.initialize().await?;
        Ok(session)
    }

    fn describe(&self) -> String {
        "fake-filesystem".to_string()
    }
}

/// Replays canned responses and remembers what it was asked.
pub(crate) struct ScriptedProvider {
    responses: Mutex<VecDeque<ChatResponse>>,
    requests: Mutex<Vec<(Vec<ChatMessage>, Vec<String>)>>,
}

impl ScriptedProvider {
    pub(crate) fn new(responses: Vec<ChatResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Messages and bound tool names for each model call, in order.
    pub(crate) fn requests(&self) -> Vec<(Vec<ChatMessage>, Vec<String>)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn chat(&self, request: ChatRequest<'_>) -> anyhow::Result<ChatResponse> {
        let tool_names = request
            .tools
            .unwrap_or_default()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        self.requests
            .lock()
            .unwrap()
            .push((request.messages.to_vec(), tool_names));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("scripted provider has no more responses"))
    }
}

pub(crate) fn text(content: &str) -> ChatResponse {
    ChatResponse {
        text: Some(content.to_string()),
        tool_calls: Vec::new(),
    }
}

pub(crate) fn calls(calls: &[(&str, &str, Value)]) -> ChatResponse {
    ChatResponse {
        text: None,
        tool_calls: calls
            .iter()
            .map(|(id, name, args)| ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments: args.to_string(),
            })
            .collect(),
    }
}
