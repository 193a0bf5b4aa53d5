use thiserror::Error;
use toolchat_core::{ProviderError, ToolErrorCode};

#[derive(Error, Debug, Clone)]
pub enum McpError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    /// The server answered with a JSON-RPC error object.
    #[error("Server error {code}: {message}")]
    Server { code: i32, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Server disconnected")]
    Disconnected,
}

impl McpError {
    /// Maps a failure during discovery onto the provider error taxonomy.
    pub fn to_provider_error(&self, timeout: std::time::Duration) -> ProviderError {
        match self {
            McpError::Timeout(_) => ProviderError::Timeout(timeout),
            McpError::Protocol(_) | McpError::Serialization(_) | McpError::Server { .. } => {
                ProviderError::Protocol(self.to_string())
            }
            McpError::Transport(_)
            | McpError::Connection(_)
            | McpError::InvalidConfig(_)
            | McpError::Disconnected => ProviderError::Unreachable(self.to_string()),
        }
    }

    /// Code reported when a `tools/call` fails with this error.
    pub fn invocation_code(&self) -> ToolErrorCode {
        match self {
            McpError::Timeout(_) => ToolErrorCode::Timeout,
            McpError::Server { .. } => ToolErrorCode::ProviderExecutionError,
            McpError::Protocol(_) | McpError::Serialization(_) => ToolErrorCode::ProtocolError,
            McpError::Transport(_)
            | McpError::Connection(_)
            | McpError::InvalidConfig(_)
            | McpError::Disconnected => ToolErrorCode::ProviderUnreachable,
        }
    }

    /// Whether the session that produced this error is no longer usable.
    pub fn is_session_lost(&self) -> bool {
        matches!(
            self,
            McpError::Transport(_) | McpError::Connection(_) | McpError::Disconnected
        )
    }
}

impl From<serde_json::Error> for McpError {
    fn from(e: serde_json::Error) -> Self {
        McpError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for McpError {
    fn from(e: std::io::Error) -> Self {
        McpError::Transport(e.to_string())
    }
}

impl From<reqwest::Error> for McpError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            McpError::Timeout(e.to_string())
        } else {
            McpError::Transport(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, McpError>;
