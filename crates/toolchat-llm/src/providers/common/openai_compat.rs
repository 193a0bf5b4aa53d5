//! OpenAI chat-completions wire format: request bodies and stream chunks.

use serde::Deserialize;
use serde_json::{json, Value};
use toolchat_core::{Message, Role, ToolSchema};

use crate::provider::{CompletionOptions, Result};
use crate::types::{LLMChunk, ToolCallDelta};

/// Converts history to the OpenAI `messages` array.
///
/// The wire format needs an assistant message listing the tool calls before
/// their results. History keeps the originating call and its round on each
/// tool message, so every round of results is preceded by a synthesized
/// assistant entry.
pub fn messages_to_openai_compat_json(messages: &[Message]) -> Vec<Value> {
    let mut out = Vec::with_capacity(messages.len());
    let mut index = 0;

    while index < messages.len() {
        let message = &messages[index];

        if message.role != Role::Tool {
            let role = match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            out.push(json!({ "role": role, "content": message.text() }));
            index += 1;
            continue;
        }

        let round = message.tool_round.as_deref();
        let run_end = messages[index..]
            .iter()
            .position(|m| m.role != Role::Tool || m.tool_round.as_deref() != round)
            .map_or(messages.len(), |offset| index + offset);
        let run = &messages[index..run_end];

        let calls: Vec<Value> = run
            .iter()
            .filter_map(|m| m.tool_call.as_ref())
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": call.tool_type,
                    "function": {
                        "name": call.function.name,
                        "arguments": call.function.arguments,
                    }
                })
            })
            .collect();
        if !calls.is_empty() {
            out.push(json!({ "role": "assistant", "content": null, "tool_calls": calls }));
        }

        for result in run {
            out.push(json!({
                "role": "tool",
                "tool_call_id": result.tool_call_id,
                "content": result.text(),
            }));
        }
        index = run_end;
    }

    out
}

pub fn build_openai_compat_body(
    model: &str,
    messages: &[Message],
    tools: &[ToolSchema],
    options: &CompletionOptions,
) -> Value {
    let mut body = json!({
        "model": model,
        "messages": messages_to_openai_compat_json(messages),
        "stream": true,
    });

    if !tools.is_empty() {
        body["tools"] = json!(tools);
    }

    if let Some(max_tokens) = options.max_output_tokens {
        body["max_tokens"] = json!(max_tokens);
    }

    body
}

#[derive(Debug, Deserialize)]
struct OpenAICompatStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAICompatChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatChoice {
    #[serde(default)]
    delta: OpenAICompatDelta,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAICompatDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAICompatToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatToolCallDelta {
    index: Option<usize>,
    id: Option<String>,
    function: Option<OpenAICompatFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

/// Parses one SSE `data:` payload. `[DONE]` is the completion signal. A delta
/// may carry text and tool-call fragments together; the text comes first.
pub fn parse_openai_compat_sse_data(data: &str) -> Result<Vec<LLMChunk>> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data == "[DONE]" {
        return Ok(vec![LLMChunk::Done]);
    }

    let chunk: OpenAICompatStreamChunk = serde_json::from_str(data)?;
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(Vec::new());
    };

    let mut chunks = Vec::new();
    if let Some(text) = choice.delta.content.filter(|text| !text.is_empty()) {
        chunks.push(LLMChunk::Token(text));
    }
    if let Some(tool_calls) = choice.delta.tool_calls.filter(|calls| !calls.is_empty()) {
        let deltas = tool_calls
            .into_iter()
            .map(|tc| {
                let (name, arguments) = match tc.function {
                    Some(function) => (function.name, function.arguments.unwrap_or_default()),
                    None => (None, String::new()),
                };
                ToolCallDelta {
                    index: tc.index,
                    id: tc.id,
                    name,
                    arguments,
                }
            })
            .collect();
        chunks.push(LLMChunk::ToolCalls(deltas));
    }

    Ok(chunks)
}
