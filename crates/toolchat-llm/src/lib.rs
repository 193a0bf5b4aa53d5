pub mod provider;
pub mod providers;
pub mod types;

pub use provider::{CompletionOptions, LLMError, LLMProvider, LLMStream};
pub use providers::OpenAIProvider;
pub use types::{LLMChunk, ToolCallDelta};
