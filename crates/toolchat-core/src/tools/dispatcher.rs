use std::sync::Arc;
use std::time::Duration;

use super::index::ToolIndex;
use super::provider::ProviderError;
use super::result::{ToolErrorCode, ToolInvocationResult};
use super::schema::validate_arguments;
use super::types::{parse_arguments, ToolCall};

/// Routes model-issued tool calls to the provider that owns the tool.
///
/// Dispatch never faults: every problem is reported as a `Failure` result so
/// the model can see it and recover.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    index: Arc<ToolIndex>,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(index: Arc<ToolIndex>, timeout: Duration) -> Self {
        Self { index, timeout }
    }

    pub fn index(&self) -> &ToolIndex {
        &self.index
    }

    pub async fn dispatch(&self, call: &ToolCall) -> ToolInvocationResult {
        let name = call.function.name.as_str();

        let Some(route) = self.index.lookup(name) else {
            return ToolInvocationResult::failure(
                ToolErrorCode::UnknownTool,
                format!("Tool not found: {name}"),
            );
        };

        let arguments = match parse_arguments(&call.function.arguments) {
            Ok(arguments) => arguments,
            Err(reason) => {
                return ToolInvocationResult::failure(ToolErrorCode::InvalidArguments, reason)
            }
        };

        if let Err(error) = validate_arguments(&route.descriptor, &arguments) {
            return ToolInvocationResult::failure(ToolErrorCode::InvalidArguments, error.to_string());
        }

        log::debug!(
            "dispatching '{}' ({}) to provider '{}'",
            name,
            call.id,
            route.provider.id()
        );

        match tokio::time::timeout(
            self.timeout,
            route.provider.invoke(name, &arguments, self.timeout),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => ProviderError::Timeout(self.timeout).into_result(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{
        ContentBlock, LocalToolProvider, Tool, ToolError, ToolProvider,
    };
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct PriceTool {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for PriceTool {
        fn name(&self) -> &str {
            "get_product_by_id"
        }

        fn description(&self) -> &str {
            "Looks up a product"
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"]
            })
        }

        async fn execute(&self, _args: Value) -> Result<Vec<ContentBlock>, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![ContentBlock::text("42.00")])
        }
    }

    async fn dispatcher(calls: Arc<AtomicUsize>) -> ToolDispatcher {
        let local = LocalToolProvider::new("products");
        local.register(PriceTool { calls }).unwrap();
        let provider: Arc<dyn ToolProvider> = Arc::new(local);
        let tools = provider.list_tools(Duration::from_secs(1)).await.unwrap();
        ToolDispatcher::new(
            Arc::new(ToolIndex::build([(provider, tools)])),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn dispatches_to_owning_provider() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(calls.clone()).await;

        let result = dispatcher
            .dispatch(&ToolCall::new("c1", "get_product_by_id", r#"{"id":"P"}"#))
            .await;

        assert_eq!(result, ToolInvocationResult::text("42.00"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_without_invoking_anything() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(calls.clone()).await;

        let result = dispatcher
            .dispatch(&ToolCall::new("c1", "delete_everything", "{}"))
            .await;

        assert_eq!(result.error_code(), Some(ToolErrorCode::UnknownTool));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_name_is_reported_before_bad_arguments() {
        let dispatcher = dispatcher(Arc::new(AtomicUsize::new(0))).await;

        let result = dispatcher
            .dispatch(&ToolCall::new("c1", "delete_everything", "not json"))
            .await;

        assert_eq!(result.error_code(), Some(ToolErrorCode::UnknownTool));
    }

    #[tokio::test]
    async fn invalid_arguments_never_reach_the_provider() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(calls.clone()).await;

        for arguments in ["not json", "[]", "{}", r#"{"id":5}"#] {
            let result = dispatcher
                .dispatch(&ToolCall::new("c1", "get_product_by_id", arguments))
                .await;
            assert_eq!(
                result.error_code(),
                Some(ToolErrorCode::InvalidArguments),
                "arguments {arguments}"
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
