use crate::tools::{ContentBlock, ToolCall, ToolInvocationResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// Flattens the content into the plain text a chat transport can carry.
    pub fn to_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .map(ContentBlock::to_text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default = "generate_id")]
    pub id: String,
    pub role: Role,
    pub content: MessageContent,
    /// Correlation id of the tool call a `Role::Tool` message answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// The originating request, kept so transports can replay the pairing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
    /// Tool results sharing a round id answer the same model request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_round: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    fn new(role: Role, content: MessageContent) -> Self {
        Self {
            id: generate_id(),
            role,
            content,
            tool_call_id: None,
            tool_call: None,
            tool_round: None,
            is_error: false,
            created_at: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, MessageContent::Text(content.into()))
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, MessageContent::Text(content.into()))
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessageContent::Text(content.into()))
    }

    pub fn tool_result(call: &ToolCall, result: &ToolInvocationResult) -> Self {
        let content = match result {
            ToolInvocationResult::Success { content } => MessageContent::Blocks(content.clone()),
            ToolInvocationResult::Failure { .. } => MessageContent::Text(result.render()),
        };

        Self {
            tool_call_id: Some(call.id.clone()),
            tool_call: Some(call.clone()),
            is_error: !result.is_success(),
            ..Self::new(Role::Tool, content)
        }
    }

    pub fn in_round(mut self, round: impl Into<String>) -> Self {
        self.tool_round = Some(round.into());
        self
    }

    pub fn text(&self) -> String {
        self.content.to_text()
    }
}
