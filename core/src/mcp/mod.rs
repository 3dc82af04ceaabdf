pub mod error;
mod protocol;
pub mod session;
mod transport;

pub use error::{McpError, McpResult};
pub use session::{
    McpConnector, McpSession, SessionManager, SessionState, ToolBackend, ToolDescriptor,
    with_session,
};
