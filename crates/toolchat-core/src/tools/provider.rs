use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use super::result::{ToolErrorCode, ToolInvocationResult};
use super::schema::ToolDescriptor;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider unreachable: {0}")]
    Unreachable(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    pub fn error_code(&self) -> ToolErrorCode {
        match self {
            ProviderError::Unreachable(_) => ToolErrorCode::ProviderUnreachable,
            ProviderError::Protocol(_) => ToolErrorCode::ProtocolError,
            ProviderError::Timeout(_) => ToolErrorCode::Timeout,
        }
    }

    pub fn into_result(self) -> ToolInvocationResult {
        ToolInvocationResult::failure(self.error_code(), self.to_string())
    }
}

/// A source of tools: lists a catalog and runs invocations against it.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    fn id(&self) -> &str;

    /// Fetches the current catalog. Malformed descriptors are skipped.
    async fn list_tools(&self, timeout: Duration) -> Result<Vec<ToolDescriptor>, ProviderError>;

    /// Runs one tool. Every failure comes back as a `Failure` result.
    async fn invoke(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
        timeout: Duration,
    ) -> ToolInvocationResult;
}
