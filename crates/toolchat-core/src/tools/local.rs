use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use serde_json::{Map, Value};
use thiserror::Error;

use super::provider::{ProviderError, ToolProvider};
use super::result::{ContentBlock, ToolErrorCode, ToolInvocationResult};
use super::schema::{normalize, validate_arguments, RawToolMetadata, ToolDescriptor};

#[derive(Error, Debug, Clone)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("tool with name '{0}' already registered")]
    Duplicate(String),
}

/// An in-process tool. Each `execute` call acquires whatever it needs itself.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, args: Value) -> Result<Vec<ContentBlock>, ToolError>;

    fn metadata(&self) -> RawToolMetadata {
        RawToolMetadata::new(self.name(), self.description(), self.parameters_schema())
    }
}

pub type SharedTool = Arc<dyn Tool>;

/// Tool provider backed by `Tool` objects living in this process.
pub struct LocalToolProvider {
    id: String,
    tools: DashMap<String, SharedTool>,
}

impl LocalToolProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tools: DashMap::new(),
        }
    }

    pub fn register<T>(&self, tool: T) -> Result<(), ToolError>
    where
        T: Tool + 'static,
    {
        self.register_shared(Arc::new(tool))
    }

    pub fn register_shared(&self, tool: SharedTool) -> Result<(), ToolError> {
        let name = tool.name().trim().to_string();
        if name.is_empty() {
            return Err(ToolError::InvalidArguments(
                "tool name cannot be empty".to_string(),
            ));
        }

        match self.tools.entry(name) {
            Entry::Occupied(entry) => Err(ToolError::Duplicate(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(tool);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn descriptor(&self, tool: &SharedTool) -> Option<ToolDescriptor> {
        match normalize(tool.metadata()) {
            Ok(descriptor) => Some(descriptor),
            Err(error) => {
                log::warn!("[{}] skipping tool: {}", self.id, error);
                None
            }
        }
    }
}

#[async_trait]
impl ToolProvider for LocalToolProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn list_tools(&self, _timeout: Duration) -> Result<Vec<ToolDescriptor>, ProviderError> {
        let mut descriptors: Vec<ToolDescriptor> = self
            .tools
            .iter()
            .filter_map(|entry| self.descriptor(entry.value()))
            .collect();
        descriptors.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(descriptors)
    }

    async fn invoke(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
        timeout: Duration,
    ) -> ToolInvocationResult {
        let Some(tool) = self.tools.get(name).map(|entry| Arc::clone(entry.value())) else {
            return ToolInvocationResult::failure(
                ToolErrorCode::UnknownTool,
                format!("Tool not found: {name}"),
            );
        };

        let Some(descriptor) = self.descriptor(&tool) else {
            return ToolInvocationResult::failure(
                ToolErrorCode::ProtocolError,
                format!("tool '{name}' has an unusable schema"),
            );
        };
        if let Err(error) = validate_arguments(&descriptor, arguments) {
            return ToolInvocationResult::failure(ToolErrorCode::InvalidArguments, error.to_string());
        }

        match tokio::time::timeout(timeout, tool.execute(Value::Object(arguments.clone()))).await {
            Ok(Ok(content)) => ToolInvocationResult::Success { content },
            Ok(Err(ToolError::InvalidArguments(message))) => {
                ToolInvocationResult::failure(ToolErrorCode::InvalidArguments, message)
            }
            Ok(Err(ToolError::NotFound(message))) => {
                ToolInvocationResult::failure(ToolErrorCode::UnknownTool, message)
            }
            Ok(Err(error)) => {
                ToolInvocationResult::failure(ToolErrorCode::ProviderExecutionError, error.to_string())
            }
            Err(_) => ProviderError::Timeout(timeout).into_result(),
        }
    }
}
