use crate::agent::{AgentState, Node, ToolRegistry};
use crate::config::DEFAULT_SYSTEM_PROMPT;
use crate::traits::{ChatMessage, ChatRequest, ChatResponse, Provider, ToolCall};
use anyhow::Result;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_MAX_ITERATIONS: usize = 25;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("agent stopped after {limit} model turns without a final answer")]
    StepLimitExceeded { limit: usize },
}

/// Alternates between the model (`Agent`) and tool execution (`Tools`) until
/// the model answers without requesting tools.
///
/// With an empty registry the model is never offered tools and the first
/// model turn is always final.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    tool_registry: ToolRegistry,
    system_prompt: String,
    max_iterations: usize,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, tool_registry: ToolRegistry) -> Self {
        Self {
            provider,
            tool_registry,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub async fn process(&self, query: &str) -> Result<String> {
        let state = self.run(AgentState::new(&self.system_prompt, query)).await?;
        Ok(state.final_content().to_string())
    }

    /// Drives `state` to `Done` and returns the full conversation.
    pub async fn run(&self, mut state: AgentState) -> Result<AgentState> {
        let mut node = Node::Agent;
        let mut model_turns = 0;

        loop {
            node = match node {
                Node::Agent => {
                    if model_turns == self.max_iterations {
                        return Err(AgentError::StepLimitExceeded {
                            limit: self.max_iterations,
                        }
                        .into());
                    }
                    model_turns += 1;
                    self.agent_step(&mut state).await?
                }
                Node::Tools => self.tools_step(&mut state).await,
                Node::Done => {
                    info!(model_turns, messages = state.messages().len(), "Agent finished");
                    return Ok(state);
                }
            };
        }
    }

    async fn agent_step(&self, state: &mut AgentState) -> Result<Node> {
        let specs = self.tool_registry.get_specs();
        let request = ChatRequest {
            messages: state.messages(),
            tools: (!specs.is_empty()).then_some(specs.as_slice()),
        };

        let response = self.provider.chat(request).await?;

        if self.tool_registry.is_empty() || !response.has_tool_calls() {
            state.push(ChatMessage::assistant(response.text_or_empty()));
            return Ok(Node::Done);
        }

        let ChatResponse { text, tool_calls } = response;
        debug!(
            calls = ?tool_calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "Model requested tools"
        );
        state.push(ChatMessage::assistant_with_tool_calls(
            text.unwrap_or_default(),
            tool_calls,
        ));
        Ok(Node::Tools)
    }

    /// Runs the calls of the latest assistant turn one at a time, in order.
    async fn tools_step(&self, state: &mut AgentState) -> Node {
        let calls: Vec<ToolCall> = state
            .last()
            .map(|m| m.requested_tool_calls().to_vec())
            .unwrap_or_default();

        for call in calls {
            let content = match serde_json::from_str::<serde_json::Value>(&call.arguments) {
                Ok(args) => self
                    .tool_registry
                    .execute(&call.name, args)
                    .await
                    .into_content(),
                Err(e) => format!(
                    "Error executing tool {}: arguments are not valid JSON: {}",
                    call.name, e
                ),
            };
            state.push(ChatMessage::tool_result(call.id, content));
        }

        Node::Agent
    }
}
