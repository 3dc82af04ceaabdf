use crate::mcp::{McpError, McpResult, ToolBackend, ToolDescriptor};
use crate::tools::schema::InputSchema;
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

const OUTPUT_PREVIEW_CHARS: usize = 200;

/// A discovered MCP tool bound to the session that produced it.
pub struct AdaptedTool {
    name: String,
    description: String,
    schema: InputSchema,
    backend: Arc<dyn ToolBackend>,
}

impl std::fmt::Debug for AdaptedTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptedTool")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

pub fn adapt(descriptor: &ToolDescriptor, backend: Arc<dyn ToolBackend>) -> McpResult<AdaptedTool> {
    let schema = InputSchema::from_json_schema(&descriptor.name, &descriptor.input_schema)?;
    Ok(AdaptedTool {
        name: descriptor.name.clone(),
        description: descriptor.description.clone(),
        schema,
        backend,
    })
}

/// Adapts a whole listing. Fails on the first malformed schema or on a
/// repeated tool name.
pub fn adapt_all(
    descriptors: &[ToolDescriptor],
    backend: Arc<dyn ToolBackend>,
) -> McpResult<Vec<AdaptedTool>> {
    let mut seen = HashSet::new();
    descriptors
        .iter()
        .map(|descriptor| {
            if !seen.insert(descriptor.name.as_str()) {
                return Err(McpError::ToolBinding {
                    tool: descriptor.name.clone(),
                    reason: "duplicate tool name".to_string(),
                });
            }
            adapt(descriptor, backend.clone())
        })
        .collect()
}

#[async_trait]
impl Tool for AdaptedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.schema.to_json_schema()
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let arguments = match self.schema.validate(&args) {
            Ok(arguments) => arguments,
            Err(e) => {
                let message = format!("Error executing tool {}: {}", self.name, e);
                warn!(tool = %self.name, "{}", message);
                return Ok(ToolResult::error(message));
            }
        };

        info!(tool = %self.name, args = %serde_json::Value::Object(arguments.clone()), "Calling tool");

        match self.backend.call_tool(&self.name, arguments).await {
            Ok(output) => {
                debug!(tool = %self.name, preview = %preview(&output), "Tool output");
                Ok(ToolResult::success(output))
            }
            Err(e) => {
                let message = format!("Error executing tool {}: {}", self.name, e);
                warn!(tool = %self.name, "{}", message);
                Ok(ToolResult::error(message))
            }
        }
    }
}

fn preview(output: &str) -> String {
    let mut chars = output.chars();
    let head: String = chars.by_ref().take(OUTPUT_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
