use crate::agent::{AgentError, AgentLoop, ToolRegistry};
use crate::config::Config;
use crate::mcp::{McpConnector, McpError, McpSession, ToolBackend, ToolDescriptor, with_session};
use crate::tools::adapt_all;
use crate::traits::Provider;
use std::sync::Arc;
use thiserror::Error;
use tracing::{Instrument, error, info, info_span, warn};

/// A failed request, carrying the rendered error chain for the caller.
#[derive(Debug, Error)]
#[error("{detail}")]
pub struct RequestFailure {
    pub kind: &'static str,
    pub detail: String,
}

impl RequestFailure {
    pub fn from_error(err: &anyhow::Error) -> Self {
        let kind = error_kind(err);
        Self {
            kind,
            detail: format!("{kind}: {err:#}\n\n{err:?}"),
        }
    }
}

fn error_kind(err: &anyhow::Error) -> &'static str {
    for cause in err.chain() {
        if let Some(mcp) = cause.downcast_ref::<McpError>() {
            return mcp.kind();
        }
        if let Some(AgentError::StepLimitExceeded { .. }) = cause.downcast_ref::<AgentError>() {
            return "StepLimitExceeded";
        }
        if cause.is::<reqwest::Error>() {
            return "ModelRequest";
        }
    }
    "Error"
}

/// Serves one query end to end: a fresh tool session, a fresh agent loop.
///
/// Nothing here is mutated per request, so one handler is shared by every
/// concurrent request.
pub struct RequestHandler {
    config: Arc<Config>,
    provider: Arc<dyn Provider>,
    connector: Arc<dyn McpConnector>,
}

impl RequestHandler {
    pub fn new(
        config: Arc<Config>,
        provider: Arc<dyn Provider>,
        connector: Arc<dyn McpConnector>,
    ) -> Self {
        Self {
            config,
            provider,
            connector,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    /// Identifier of the tool process this handler connects to.
    pub fn server_identifier(&self) -> String {
        self.connector.describe()
    }

    pub async fn handle(&self, query: &str) -> Result<String, RequestFailure> {
        let request_id = uuid::Uuid::new_v4();
        let span = info_span!("request", id = %request_id);

        async {
            info!(query, "Handling chat request");
            let result = with_session(self.connector.as_ref(), |session| async move {
                let tools = bind_tools(&session).await;
                info!(tools = tools.len(), "Tools bound");
                AgentLoop::new(self.provider.clone(), tools)
                    .with_system_prompt(self.config.system_prompt.as_str())
                    .with_max_iterations(self.config.max_iterations)
                    .process(query)
                    .await
            })
            .await;

            result.map_err(|err| {
                let failure = RequestFailure::from_error(&err);
                error!(kind = failure.kind, "Request failed: {:#}", err);
                failure
            })
        }
        .instrument(span)
        .await
    }

    /// Lists the tools of a freshly started session.
    pub async fn list_tools(&self) -> anyhow::Result<Vec<ToolDescriptor>> {
        with_session(self.connector.as_ref(), |session| async move {
            Ok(session.list_tools().await?)
        })
        .await
    }
}

/// Discovers and adapts the session's tools. Any failure leaves the loop
/// without tools rather than failing the request.
async fn bind_tools(session: &Arc<McpSession>) -> ToolRegistry {
    let descriptors = match session.list_tools().await {
        Ok(descriptors) => descriptors,
        Err(e) => {
            warn!("Tool discovery failed, continuing without tools: {}", e);
            return ToolRegistry::new();
        }
    };

    let backend: Arc<dyn ToolBackend> = session.clone();
    match adapt_all(&descriptors, backend) {
        Ok(tools) => ToolRegistry::from_tools(tools),
        Err(e) => {
            warn!("Tool binding failed, continuing without tools: {}", e);
            ToolRegistry::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::McpServerConfig;
    use crate::mcp::SessionManager;
    use crate::test_support::{FakeConnector, FakeServer, ScriptedProvider, calls, text};
    use crate::traits::Role;
    use serde_json::json;

    fn handler(provider: Arc<dyn Provider>, connector: impl McpConnector + 'static) -> RequestHandler {
        RequestHandler::new(Arc::new(Config::default()), provider, Arc::new(connector))
    }

    #[tokio::test]
    async fn lists_current_directory_end_to_end() {
        let connector = FakeConnector::filesystem();
        let provider = ScriptedProvider::new(vec![
            calls(&[("call_1", "list_directory", json!({"path": "."}))]),
            text("The directory contains Cargo.toml and src."),
        ]);
        let handler = handler(provider.clone(), connector);

        let answer = handler.handle("list files in current directory").await.unwrap();

        assert_eq!(answer, "The directory contains Cargo.toml and src.");
        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].1, vec!["list_directory", "read_file"]);
        let tool_message = requests[1].0.last().unwrap();
        assert_eq!(tool_message.role, Role::Tool);
        assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(tool_message.content, "[FILE] Cargo.toml\n[DIR] src");
    }

    #[tokio::test]
    async fn empty_discovery_runs_without_tools() {
        let connector = FakeConnector::new(FakeServer::with_tools(vec![]));
        let provider = ScriptedProvider::new(vec![text("no tools here")]);
        let handler = handler(provider.clone(), connector);

        assert_eq!(handler.handle("hi").await.unwrap(), "no tools here");
        assert!(provider.requests()[0].1.is_empty());
    }

    #[tokio::test]
    async fn malformed_schema_degrades_to_no_tools() {
        let connector = FakeConnector::new(FakeServer::with_tools(vec![json!({
            "name": "broken",
            "inputSchema": {"type": "object", "properties": {"x": "string"}}
        })]));
        let provider = ScriptedProvider::new(vec![text("answered anyway")]);
        let handler = handler(provider.clone(), connector);

        assert_eq!(handler.handle("hi").await.unwrap(), "answered anyway");
        assert!(provider.requests()[0].1.is_empty());
    }

    #[tokio::test]
    async fn spawn_failure_names_the_error_type() {
        let config = Config {
            mcp: McpServerConfig {
                command: "evren-test-no-such-binary".to_string(),
                args: vec![],
                ..Default::default()
            },
            ..Default::default()
        };
        let connector = SessionManager::new(config.mcp.clone());
        let provider = ScriptedProvider::new(vec![text("never asked")]);
        let handler = RequestHandler::new(Arc::new(config), provider.clone(), Arc::new(connector));

        let failure = handler.handle("hi").await.unwrap_err();

        assert_eq!(failure.kind, "Spawn");
        assert!(failure.detail.starts_with("Spawn: failed to start MCP server"));
        assert!(failure.detail.contains("evren-test-no-such-binary"));
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn model_failure_is_a_request_failure() {
        let handler = handler(ScriptedProvider::new(vec![]), FakeConnector::filesystem());
        let failure = handler.handle("hi").await.unwrap_err();
        assert_eq!(failure.kind, "Error");
        assert!(failure.detail.contains("no more responses"));
    }

    #[tokio::test]
    async fn list_tools_reports_descriptors() {
        let handler = handler(ScriptedProvider::new(vec![]), FakeConnector::filesystem());
        let tools = handler.list_tools().await.unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["list_directory", "read_file"]);
        assert_eq!(tools[0].input_schema["required"], json!(["path"]));
    }
}
