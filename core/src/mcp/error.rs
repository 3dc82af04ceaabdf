use thiserror::Error;

/// Failures surfaced by the session manager and the tool adapter.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("MCP session not ready: {0}")]
    SessionNotReady(&'static str),

    #[error("failed to start MCP server `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("MCP transport error: {0}")]
    Transport(String),

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("MCP error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("tool `{tool}` failed: {cause}")]
    ToolInvocation { tool: String, cause: String },

    #[error("cannot bind tool `{tool}`: {reason}")]
    ToolBinding { tool: String, reason: String },
}

impl McpError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn protocol(err: impl std::fmt::Display) -> Self {
        Self::Protocol(err.to_string())
    }

    /// Variant name, used to label request diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionNotReady(_) => "SessionNotReady",
            Self::Spawn { .. } => "Spawn",
            Self::Transport(_) => "Transport",
            Self::Protocol(_) => "Protocol",
            Self::Rpc { .. } => "Rpc",
            Self::ToolInvocation { .. } => "ToolInvocation",
            Self::ToolBinding { .. } => "ToolBinding",
        }
    }
}

pub type McpResult<T> = Result<T, McpError>;
