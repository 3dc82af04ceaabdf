use crate::config::McpServerConfig;
use crate::mcp::error::{McpError, McpResult};
use crate::mcp::protocol;
use crate::mcp::transport::StdioChannel;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const MAX_TOOL_PAGES: usize = 100;
const CHILD_EXIT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Connected,
    Closed,
}

/// Metadata for one callable operation exposed by the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Anything that can execute a named tool with string-keyed arguments.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> McpResult<String>;
}

/// Opens initialized sessions. Implemented by [`SessionManager`] for real
/// subprocesses.
#[async_trait]
pub trait McpConnector: Send + Sync {
    async fn connect(&self) -> McpResult<McpSession>;

    /// Human-readable identifier of the server behind this connector.
    fn describe(&self) -> String;
}

/// Spawns the configured tool process once per [`McpConnector::connect`].
#[derive(Debug, Clone)]
pub struct SessionManager {
    config: McpServerConfig,
}

impl SessionManager {
    pub fn new(config: McpServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    fn spawn(&self) -> McpResult<McpSession> {
        info!(command = %self.config.command, args = ?self.config.args, "Starting MCP stdio server");
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(env) = &self.config.env {
            cmd.envs(env);
        }

        let mut child = cmd.spawn().map_err(|source| McpError::Spawn {
            command: self.config.command.clone(),
            source,
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Transport("Unable to retrieve stdin.".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Transport("Unable to retrieve stdout.".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            spawn_stderr_drain(stderr);
        }

        let timeout = Duration::from_secs(self.config.request_timeout_secs);
        let mut session = McpSession::from_streams(stdout, stdin, timeout);
        session.child = Mutex::new(Some(child));
        Ok(session)
    }
}

#[async_trait]
impl McpConnector for SessionManager {
    async fn connect(&self) -> McpResult<McpSession> {
        let session = self.spawn()?;
        if let Err(err) = session.initialize().await {
            session.close().await;
            return Err(err);
        }
        Ok(session)
    }

    fn describe(&self) -> String {
        self.config.display_command()
    }
}

/// Runs `f` against a freshly connected session and closes it afterwards,
/// whatever `f` returns. If the returned future is dropped early the child
/// process is killed when the last session handle goes away.
pub async fn with_session<C, F, Fut, T>(connector: &C, f: F) -> anyhow::Result<T>
where
    C: McpConnector + ?Sized,
    F: FnOnce(Arc<McpSession>) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let session = Arc::new(connector.connect().await?);
    let result = f(session.clone()).await;
    session.close().await;
    result
}

struct SessionInner {
    state: SessionState,
    channel: Option<StdioChannel>,
}

/// A live connection to one tool process.
///
/// All calls go through a single lock, so requests on one session never
/// overlap.
pub struct McpSession {
    inner: Mutex<SessionInner>,
    child: Mutex<Option<Child>>,
    server_name: std::sync::OnceLock<String>,
}

impl McpSession {
    /// Wraps an already-open byte stream pair. The session starts
    /// `Unconnected` until [`McpSession::initialize`] succeeds.
    pub fn from_streams<R, W>(reader: R, writer: W, request_timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            inner: Mutex::new(SessionInner {
                state: SessionState::Unconnected,
                channel: Some(StdioChannel::new(reader, writer, request_timeout)),
            }),
            child: Mutex::new(None),
            server_name: std::sync::OnceLock::new(),
        }
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.get().map(String::as_str)
    }

    /// Performs the `initialize` handshake and moves the session to `Connected`.
    pub async fn initialize(&self) -> McpResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != SessionState::Unconnected {
            return Err(McpError::SessionNotReady(
                "initialize is only valid on a new session",
            ));
        }
        let channel = inner
            .channel
            .as_mut()
            .ok_or(McpError::SessionNotReady("session has no transport"))?;

        let response = channel
            .request(protocol::initialize_request())
            .await?;
        let details = protocol::parse_initialize_result(response)?;
        channel.notify_initialized().await?;

        info!(
            server = %details.server_info.name,
            version = %details.server_info.version,
            protocol = %details.protocol_version,
            "MCP session initialized"
        );
        let _ = self.server_name.set(details.server_info.name.clone());
        inner.state = SessionState::Connected;
        Ok(())
    }

    /// Lists every tool the server exposes, following pagination cursors.
    pub async fn list_tools(&self) -> McpResult<Vec<ToolDescriptor>> {
        let mut inner = self.inner.lock().await;
        let channel = connected_channel(&mut inner)?;

        let mut descriptors = Vec::new();
        let mut cursor = None;
        for _ in 0..MAX_TOOL_PAGES {
            let response = channel.request(protocol::list_tools_request(cursor)).await?;
            let page = protocol::parse_list_tools(response)?;
            for tool in page.tools {
                let input_schema =
                    serde_json::to_value(&tool.input_schema).map_err(McpError::protocol)?;
                descriptors.push(ToolDescriptor {
                    name: tool.name,
                    description: tool.description.unwrap_or_default(),
                    input_schema,
                });
            }
            cursor = page.next_cursor.filter(|c| !c.is_empty());
            if cursor.is_none() {
                break;
            }
        }
        if cursor.is_some() {
            warn!(pages = MAX_TOOL_PAGES, "MCP tool listing truncated");
        }

        debug!(count = descriptors.len(), "Listed MCP tools");
        Ok(descriptors)
    }

    /// Ends the session: closes the server's stdin, gives it a moment to
    /// exit, then kills it. Safe to call more than once.
    pub async fn close(&self) {
        let channel = {
            let mut inner = self.inner.lock().await;
            if inner.state == SessionState::Closed {
                return;
            }
            inner.state = SessionState::Closed;
            inner.channel.take()
        };
        if let Some(mut channel) = channel {
            channel.shutdown().await;
        }

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout(CHILD_EXIT_GRACE, child.wait()).await {
                Ok(Ok(status)) => debug!(%status, "MCP server exited"),
                Ok(Err(err)) => warn!(error = %err, "Waiting for MCP server failed"),
                Err(_) => {
                    debug!("MCP server did not exit, killing it");
                    if let Err(err) = child.kill().await {
                        warn!(error = %err, "Killing MCP server failed");
                    }
                }
            }
        }
        debug!("MCP session closed");
    }
}

#[async_trait]
impl ToolBackend for McpSession {
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> McpResult<String> {
        let mut inner = self.inner.lock().await;
        let channel = connected_channel(&mut inner)?;
        let response = channel
            .request(protocol::call_tool_request(name, arguments))
            .await
            .map_err(|err| McpError::ToolInvocation {
                tool: name.to_string(),
                cause: err.to_string(),
            })?;
        protocol::parse_call_tool(name, response)
    }
}

fn connected_channel(inner: &mut SessionInner) -> McpResult<&mut StdioChannel> {
    match inner.state {
        SessionState::Unconnected => {
            return Err(McpError::SessionNotReady("session has not been initialized"));
        }
        SessionState::Closed => return Err(McpError::SessionNotReady("session is closed")),
        SessionState::Connected => {}
    }
    inner
        .channel
        .as_mut()
        .ok_or(McpError::SessionNotReady("session has no transport"))
}

fn spawn_stderr_drain(stderr: ChildStderr) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            debug!(target: "mcp_server", "{}", line);
        }
    });
}
