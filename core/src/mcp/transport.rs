//! Newline-delimited JSON-RPC framing over a pair of byte streams.

use crate::mcp::error::{McpError, McpResult};
use crate::mcp::protocol;
use rust_mcp_schema::RequestId;
use rust_mcp_schema::schema_utils::{RequestFromClient, ServerMessage};
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tracing::debug;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One request in flight at a time: `request` writes a message and reads
/// until the matching response arrives.
pub(crate) struct StdioChannel {
    reader: Lines<BufReader<BoxedReader>>,
    writer: BoxedWriter,
    next_request_id: i64,
    request_timeout: Duration,
}

impl StdioChannel {
    pub(crate) fn new<R, W>(reader: R, writer: W, request_timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let reader: BoxedReader = Box::new(reader);
        Self {
            reader: BufReader::new(reader).lines(),
            writer: Box::new(writer),
            next_request_id: 0,
            request_timeout,
        }
    }

    pub(crate) async fn request(&mut self, request: RequestFromClient) -> McpResult<ServerMessage> {
        let request_id = RequestId::Integer(self.next_request_id);
        self.next_request_id += 1;

        let payload = protocol::encode_request(request, request_id.clone())?;
        debug!(request_id = ?request_id, bytes = payload.len(), "Writing MCP stdio request");
        self.write_line(&payload).await?;

        let timeout = self.request_timeout;
        tokio::time::timeout(timeout, self.read_response(&request_id))
            .await
            .map_err(|_| {
                McpError::Transport(format!(
                    "MCP request timed out after {}s",
                    timeout.as_secs()
                ))
            })?
    }

    pub(crate) async fn notify_initialized(&mut self) -> McpResult<()> {
        let payload = protocol::encode_initialized()?;
        self.write_line(&payload).await
    }

    /// Closes the write side so the server sees EOF on its stdin.
    pub(crate) async fn shutdown(&mut self) {
        if let Err(err) = self.writer.shutdown().await {
            debug!(error = %err, "Closing MCP stdin failed");
        }
    }

    async fn write_line(&mut self, payload: &str) -> McpResult<()> {
        self.writer
            .write_all(payload.as_bytes())
            .await
            .map_err(McpError::transport)?;
        self.writer
            .write_all(b"\n")
            .await
            .map_err(McpError::transport)?;
        self.writer.flush().await.map_err(McpError::transport)
    }

    async fn read_response(&mut self, request_id: &RequestId) -> McpResult<ServerMessage> {
        loop {
            let line = self
                .reader
                .next_line()
                .await
                .map_err(McpError::transport)?
                .ok_or_else(|| {
                    McpError::Transport("MCP server closed the connection".to_string())
                })?;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let value = match serde_json::from_str::<Value>(line) {
                Ok(value) => value,
                Err(err) => {
                    debug!(error = %err, "Skipping non-JSON line from MCP server");
                    continue;
                }
            };

            let items = match value {
                Value::Array(items) => items,
                single => vec![single],
            };

            for item in items {
                let message = match serde_json::from_value::<ServerMessage>(item) {
                    Ok(message) => message,
                    Err(err) => {
                        debug!(error = %err, "Skipping unrecognized MCP message");
                        continue;
                    }
                };
                if is_reply_to(&message, request_id) {
                    debug!(request_id = ?request_id, "MCP stdio response received");
                    return Ok(message);
                }
                log_unsolicited(&message);
            }
        }
    }
}

fn is_reply_to(message: &ServerMessage, request_id: &RequestId) -> bool {
    match protocol::response_id(message) {
        Some(id) => id == request_id,
        // An error without an id means the server could not read our request.
        None => matches!(message, ServerMessage::Error(_)),
    }
}

fn log_unsolicited(message: &ServerMessage) {
    match message {
        ServerMessage::Request(request) => {
            debug!(method = %request.method(), "Ignoring MCP server request");
        }
        ServerMessage::Notification(_) => debug!("Received MCP notification"),
        other => debug!(id = ?protocol::response_id(other), "Discarding stale MCP response"),
    }
}
