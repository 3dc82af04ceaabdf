use crate::api::{ApiError, AppState};
use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

const DASHBOARD_TOOL_PREVIEW: usize = 5;

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub response: String,
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "MCP Server Running",
        "health": "/health",
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": state.handler.config().service_name,
    }))
}

/// Status summary. Tool discovery failures are reported in the body, never
/// as an HTTP error.
pub async fn dashboard(State(state): State<AppState>) -> Json<Value> {
    let tools = match state.handler.list_tools().await {
        Ok(tools) => tools,
        Err(e) => {
            warn!("Dashboard tool discovery failed: {:#}", e);
            return Json(json!({
                "status": "error",
                "detail": format!("{e:#}"),
            }));
        }
    };

    let mut names: Vec<&str> = tools
        .iter()
        .take(DASHBOARD_TOOL_PREVIEW)
        .map(|t| t.name.as_str())
        .collect();
    if tools.len() > DASHBOARD_TOOL_PREVIEW {
        names.push("...");
    }

    Json(json!({
        "system_status": "healthy",
        "started_at": state.started_at.to_rfc3339(),
        "uptime_seconds": state.uptime_seconds(),
        "connected_mcp_server": state.handler.server_identifier(),
        "ai_model": state.handler.provider().model(),
        "active_capabilities": {
            "count": tools.len(),
            "tools": names,
        },
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn mcp_tools(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let tools = state.handler.list_tools().await?;
    Ok(Json(json!({
        "count": tools.len(),
        "source": state.handler.server_identifier(),
        "tools": tools,
    })))
}

pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatReply>, ApiError> {
    match state.handler.handle(&body.query).await {
        Ok(response) => Ok(Json(ChatReply { response })),
        Err(failure) => Err(ApiError::new(format!(
            "REAL ERROR FOUND:\n{}",
            failure.detail
        ))),
    }
}
