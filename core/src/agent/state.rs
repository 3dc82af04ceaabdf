use crate::traits::ChatMessage;

/// Conversation for a single request. Entries are only ever appended.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    messages: Vec<ChatMessage>,
}

impl AgentState {
    pub fn new(system_prompt: &str, query: &str) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(query)],
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Content of the last message, which is the loop's answer once it is done.
    pub fn final_content(&self) -> &str {
        self.last().map(|m| m.content.as_str()).unwrap_or_default()
    }
}

/// Where the loop goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Agent,
    Tools,
    Done,
}
