use crate::types::LLMChunk;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;
use toolchat_core::{Message, ToolSchema};

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("API error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, LLMError>;

pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMChunk>> + Send>>;

/// Per-request knobs passed alongside history and catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionOptions {
    /// Overrides the provider's default model when set.
    pub model: Option<String>,
    pub max_output_tokens: Option<u32>,
}

impl CompletionOptions {
    pub fn new(model: Option<String>, max_output_tokens: Option<u32>) -> Self {
        Self {
            model,
            max_output_tokens,
        }
    }
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Opens a streamed chat completion over the full history with the tool
    /// catalog attached. The stream ends with `LLMChunk::Done` on a clean
    /// finish.
    async fn chat_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &CompletionOptions,
    ) -> Result<LLMStream>;

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec![])
    }
}
