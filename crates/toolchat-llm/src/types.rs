use serde::{Deserialize, Serialize};

/// A piece of a tool call as the model streams it. A delta may carry a whole
/// call or only some of its parts; the assembler merges them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolCallDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: String,
}

impl ToolCallDelta {
    /// A complete call in a single delta.
    pub fn call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            index: None,
            id: Some(id.into()),
            name: Some(name.into()),
            arguments: arguments.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LLMChunk {
    Token(String),
    ToolCalls(Vec<ToolCallDelta>),
    /// The model finished its response.
    Done,
}
