pub mod agent;
pub mod api;
pub mod config;
pub mod handler;
pub mod mcp;
pub mod providers;
pub mod tools;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use agent::{AgentError, AgentLoop, AgentState, ToolRegistry};
pub use api::AppState;
pub use config::*;
pub use handler::{RequestFailure, RequestHandler};
pub use mcp::{McpConnector, McpError, McpSession, SessionManager};
pub use providers::*;
pub use tools::*;
pub use traits::*;
