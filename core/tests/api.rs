use async_trait::async_trait;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use evren_core::api::AppState;
use evren_core::api::routes::{ChatBody, chat, health};
use evren_core::config::{Config, McpServerConfig};
use evren_core::mcp::SessionManager;
use evren_core::traits::{ChatRequest, ChatResponse, Provider};
use evren_core::RequestHandler;
use serde_json::{Value, json};
use std::sync::Arc;

struct SilentProvider;

#[async_trait]
impl Provider for SilentProvider {
    fn name(&self) -> &str {
        "silent"
    }

    fn model(&self) -> &str {
        "silent-model"
    }

    async fn chat(&self, _request: ChatRequest<'_>) -> anyhow::Result<ChatResponse> {
        anyhow::bail!("the model must not be reached")
    }
}

fn broken_server_state() -> AppState {
    let config = Config {
        service_name: "evren-integration".to_string(),
        mcp: McpServerConfig {
            command: "evren-integration-missing-server".to_string(),
            args: vec!["--stdio".to_string()],
            ..Default::default()
        },
        ..Default::default()
    };
    let connector = Arc::new(SessionManager::new(config.mcp.clone()));
    let handler = RequestHandler::new(Arc::new(config), Arc::new(SilentProvider), connector);
    AppState::new(Arc::new(handler))
}

#[tokio::test]
async fn chat_reports_spawn_failure_as_500() {
    let response = chat(
        State(broken_server_state()),
        Json(ChatBody {
            query: "list files in current directory".to_string(),
        }),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("REAL ERROR FOUND:"));
    assert!(detail.contains("Spawn"));
    assert!(detail.contains("evren-integration-missing-server"));
    assert!(!detail.contains("must not be reached"));
}

#[tokio::test]
async fn health_ignores_tool_process_state() {
    let Json(body) = health(State(broken_server_state())).await;
    assert_eq!(body, json!({"status": "ok", "service": "evren-integration"}));
}
