pub mod loop_;
pub mod registry;
pub mod state;

pub use loop_::{AgentError, AgentLoop};
pub use registry::ToolRegistry;
pub use state::{AgentState, Node};
