pub mod agent;
pub mod tools;

pub use agent::{AgentError, Conversation, HistoryError, Message, MessageContent, Role};
pub use tools::{
    normalize, parse_arguments, validate_arguments, ArgumentError, ContentBlock, FieldSpec,
    FieldType, FunctionCall, FunctionSchema, InputSchema, LocalToolProvider, ProviderError,
    RawToolMetadata, SchemaError, Tool, ToolCall, ToolConflict, ToolDescriptor, ToolDispatcher,
    ToolError, ToolErrorCode, ToolIndex, ToolInvocationResult, ToolProvider, ToolRoute,
    ToolSchema,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
