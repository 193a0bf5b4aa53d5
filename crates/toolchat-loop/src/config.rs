use std::time::Duration;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Configuration for the conversation orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Model invocations allowed per prompt.
    pub max_rounds: usize,
    /// Seeded as the first message of a new conversation. Empty disables it.
    pub system_prompt: String,
    /// Overrides the transport's default model.
    pub model: Option<String>,
    pub max_output_tokens: u32,
    /// Per-provider bound on `list_tools`.
    pub discovery_timeout: Duration,
    /// Per-call bound on tool invocations.
    pub invocation_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: 8,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model: None,
            max_output_tokens: 1000,
            discovery_timeout: Duration::from_secs(10),
            invocation_timeout: Duration::from_secs(60),
        }
    }
}
