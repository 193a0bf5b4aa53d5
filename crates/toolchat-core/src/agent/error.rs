use thiserror::Error;

/// Violations of the conversation ordering rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("system message must be the first message of a conversation")]
    SystemNotFirst,

    #[error("tool result '{0}' does not answer an outstanding tool call")]
    UnmatchedToolResult(String),

    #[error("{0} tool result(s) still outstanding")]
    ToolResultsPending(usize),
}

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LLM(String),

    #[error("response stream ended before completion: {0}")]
    PartialResponse(String),

    #[error("could not complete after {0} tool iterations")]
    ToolLoopExceeded(usize),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Cancelled")]
    Cancelled,
}

impl AgentError {
    /// Stable machine-readable code for callers outside the process.
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::LLM(_) => "TransportError",
            AgentError::PartialResponse(_) => "PartialResponse",
            AgentError::ToolLoopExceeded(_) => "ToolLoopExceeded",
            AgentError::History(_) => "HistoryViolation",
            AgentError::Cancelled => "Cancelled",
        }
    }

    /// A partial response may succeed if the same prompt is submitted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentError::PartialResponse(_))
    }
}
