pub mod dispatcher;
pub mod index;
pub mod local;
pub mod provider;
pub mod result;
pub mod schema;
pub mod types;

pub use dispatcher::ToolDispatcher;
pub use index::{ToolConflict, ToolIndex, ToolRoute};
pub use local::{LocalToolProvider, Tool, ToolError};
pub use provider::{ProviderError, ToolProvider};
pub use result::{ContentBlock, ToolErrorCode, ToolInvocationResult};
pub use schema::{
    normalize, validate_arguments, ArgumentError, FieldSpec, FieldType, InputSchema,
    RawToolMetadata, SchemaError, ToolDescriptor,
};
pub use types::{parse_arguments, FunctionCall, FunctionSchema, ToolCall, ToolSchema};
