use async_trait::async_trait;
use reqwest::Client;
use toolchat_core::{Message, ToolSchema};

use crate::provider::{CompletionOptions, LLMError, LLMProvider, LLMStream, Result};

use super::common::openai_compat::{build_openai_compat_body, parse_openai_compat_sse_data};
use super::common::sse::llm_stream_from_sse;

/// Streaming chat transport for any OpenAI-compatible `/chat/completions`
/// endpoint.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &CompletionOptions,
    ) -> Result<LLMStream> {
        let model = options.model.as_deref().unwrap_or(&self.model);
        let body = build_openai_compat_body(model, messages, tools, options);

        log::debug!(
            "OpenAI request: model={}, messages={}, tools={}",
            model,
            messages.len(),
            tools.len()
        );

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(LLMError::Api(format!("HTTP {}: {}", status, text)));
        }

        Ok(llm_stream_from_sse(response, |_event, data| {
            parse_openai_compat_sse_data(data)
        }))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec![self.model.clone()])
    }
}
