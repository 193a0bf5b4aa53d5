use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        uri: String,
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn to_text(&self) -> String {
        match self {
            ContentBlock::Text { text } => text.clone(),
            ContentBlock::Image { mime_type, .. } => format!("[image: {mime_type}]"),
            ContentBlock::Resource { uri, text, .. } => match text {
                Some(text) => text.clone(),
                None => format!("[resource: {uri}]"),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolErrorCode {
    UnknownTool,
    InvalidArguments,
    ProviderExecutionError,
    ProviderUnreachable,
    Timeout,
    ProtocolError,
}

impl ToolErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorCode::UnknownTool => "UnknownTool",
            ToolErrorCode::InvalidArguments => "InvalidArguments",
            ToolErrorCode::ProviderExecutionError => "ProviderExecutionError",
            ToolErrorCode::ProviderUnreachable => "ProviderUnreachable",
            ToolErrorCode::Timeout => "Timeout",
            ToolErrorCode::ProtocolError => "ProtocolError",
        }
    }
}

impl fmt::Display for ToolErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one tool invocation. Failures are values, never faults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolInvocationResult {
    Success {
        content: Vec<ContentBlock>,
    },
    Failure {
        error_code: ToolErrorCode,
        message: String,
    },
}

impl ToolInvocationResult {
    pub fn text(text: impl Into<String>) -> Self {
        ToolInvocationResult::Success {
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn failure(error_code: ToolErrorCode, message: impl Into<String>) -> Self {
        ToolInvocationResult::Failure {
            error_code,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolInvocationResult::Success { .. })
    }

    pub fn error_code(&self) -> Option<ToolErrorCode> {
        match self {
            ToolInvocationResult::Success { .. } => None,
            ToolInvocationResult::Failure { error_code, .. } => Some(*error_code),
        }
    }

    /// Text form fed back to the model.
    pub fn render(&self) -> String {
        match self {
            ToolInvocationResult::Success { content } => content
                .iter()
                .map(ContentBlock::to_text)
                .collect::<Vec<_>>()
                .join("\n"),
            ToolInvocationResult::Failure {
                error_code,
                message,
            } => format!("Error [{error_code}]: {message}"),
        }
    }
}
