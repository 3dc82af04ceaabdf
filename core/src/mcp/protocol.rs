//! Request builders and response parsing for the MCP client.

use crate::mcp::error::{McpError, McpResult};
use rust_mcp_schema::schema_utils::{
    ClientMessage, FromMessage, MessageFromClient, NotificationFromClient, RequestFromClient,
    ServerMessage,
};
use rust_mcp_schema::{
    CallToolRequestParams, ClientCapabilities, Implementation, InitializeRequestParams,
    InitializeResult, LATEST_PROTOCOL_VERSION, ListToolsResult, PaginatedRequestParams,
    RequestId, RpcError,
};
use serde_json::{Map, Value};

pub(crate) fn initialize_request() -> RequestFromClient {
    RequestFromClient::InitializeRequest(client_details())
}

fn client_details() -> InitializeRequestParams {
    InitializeRequestParams {
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "evren".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: Some("Evren MCP Agent".to_string()),
            description: Some("Tool-using chat agent backed by an MCP server".to_string()),
            icons: Vec::new(),
            website_url: None,
        },
        meta: None,
        protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
    }
}

pub(crate) fn list_tools_request(cursor: Option<String>) -> RequestFromClient {
    let params = cursor.map(|cursor| PaginatedRequestParams {
        cursor: Some(cursor),
        meta: None,
    });
    RequestFromClient::ListToolsRequest(params)
}

pub(crate) fn call_tool_request(name: &str, arguments: Map<String, Value>) -> RequestFromClient {
    let params = CallToolRequestParams::new(name).with_arguments(arguments);
    RequestFromClient::CallToolRequest(params)
}

pub(crate) fn encode_request(request: RequestFromClient, id: RequestId) -> McpResult<String> {
    let message =
        ClientMessage::from_message(MessageFromClient::RequestFromClient(request), Some(id))
            .map_err(McpError::protocol)?;
    serde_json::to_string(&message).map_err(McpError::protocol)
}

pub(crate) fn encode_initialized() -> McpResult<String> {
    let message = ClientMessage::from_message(
        MessageFromClient::NotificationFromClient(
            NotificationFromClient::InitializedNotification(None),
        ),
        None,
    )
    .map_err(McpError::protocol)?;
    serde_json::to_string(&message).map_err(McpError::protocol)
}

pub(crate) fn parse_initialize_result(message: ServerMessage) -> McpResult<InitializeResult> {
    let value = parse_response_value(message)?;
    let result: InitializeResult = serde_json::from_value(value).map_err(McpError::protocol)?;
    if result.protocol_version.trim().is_empty() {
        return Err(McpError::Protocol(
            "initialize response carries no protocol version".to_string(),
        ));
    }
    Ok(result)
}

pub(crate) fn parse_list_tools(message: ServerMessage) -> McpResult<ListToolsResult> {
    let value = parse_response_value(message)?;
    serde_json::from_value(value).map_err(McpError::protocol)
}

/// Returns the tool's text output, or the reported failure as `ToolInvocation`.
///
/// Text blocks are joined with newlines; a result without text falls back to
/// the serialized result.
pub(crate) fn parse_call_tool(tool: &str, message: ServerMessage) -> McpResult<String> {
    let value = parse_response_value(message).map_err(|err| McpError::ToolInvocation {
        tool: tool.to_string(),
        cause: err.to_string(),
    })?;

    let text = value
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|text| !text.is_empty());

    let is_error = value
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let output = text.unwrap_or_else(|| value.to_string());

    if is_error {
        return Err(McpError::ToolInvocation {
            tool: tool.to_string(),
            cause: output,
        });
    }
    Ok(output)
}

pub(crate) fn parse_response_value(message: ServerMessage) -> McpResult<Value> {
    match message {
        ServerMessage::Response(response) => {
            serde_json::to_value(&response.result).map_err(McpError::protocol)
        }
        ServerMessage::Error(error) => Err(rpc_error(&error.error)),
        other => Err(McpError::Protocol(format!(
            "Unexpected MCP server message: {other:?}"
        ))),
    }
}

fn rpc_error(error: &RpcError) -> McpError {
    let mut message = error.message.clone();
    if let Some(details) = error
        .data
        .as_ref()
        .and_then(|data| {
            data.get("details")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| data.as_str().map(str::to_string))
        })
        .filter(|details| !details.is_empty())
    {
        message.push('\n');
        message.push_str(&details);
    }
    McpError::Rpc {
        code: error.code,
        message,
    }
}

/// Id carried by a response or error, if any.
pub(crate) fn response_id(message: &ServerMessage) -> Option<&RequestId> {
    match message {
        ServerMessage::Response(response) => Some(&response.id),
        ServerMessage::Error(error) => error.id.as_ref(),
        _ => None,
    }
}
