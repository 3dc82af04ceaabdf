use crate::traits::{Tool, ToolResult, ToolSpec};
use std::sync::Arc;

/// Tools bound to one agent loop.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tools<T>(tools: impl IntoIterator<Item = T>) -> Self
    where
        T: Tool + 'static,
    {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(Arc::new(tool));
        }
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn get_specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub async fn execute(&self, name: &str, args: serde_json::Value) -> ToolResult {
        let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
            return ToolResult::error(format!("Error: {} is not a valid tool", name));
        };

        match tool.execute(args).await {
            Ok(result) => result,
            Err(e) => ToolResult::error(format!("Error executing tool {}: {}", name, e)),
        }
    }
}
