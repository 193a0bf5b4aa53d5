use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use toolchat_core::ToolCall;
use toolchat_llm::{LLMChunk, LLMStream, ToolCallDelta};
use uuid::Uuid;

/// One chunk as it arrived, numbered from zero.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamUpdate {
    pub sequence: usize,
    pub chunk: LLMChunk,
}

/// A model response that reached `Done`.
#[derive(Debug, Clone, Default)]
pub struct AssembledResponse {
    pub text: String,
    pub updates: Vec<StreamUpdate>,
    pub tool_calls: Vec<ToolCall>,
}

/// Whatever had arrived before the stream broke off.
#[derive(Debug, Clone)]
pub struct PartialResponse {
    pub text: String,
    pub updates: Vec<StreamUpdate>,
    pub tool_calls: Vec<ToolCall>,
    pub reason: String,
}

#[derive(Debug)]
pub enum AssembleError {
    Partial(PartialResponse),
    Cancelled,
}

#[derive(Debug, Default)]
struct PendingCall {
    index: Option<usize>,
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Merges streamed tool call fragments into whole calls.
#[derive(Debug, Default)]
pub(crate) struct ToolCallAccumulator {
    pending: Vec<PendingCall>,
}

impl ToolCallAccumulator {
    pub(crate) fn merge(&mut self, delta: ToolCallDelta) {
        let slot = match self.find(&delta) {
            Some(position) => &mut self.pending[position],
            None => {
                self.pending.push(PendingCall {
                    index: delta.index,
                    ..Default::default()
                });
                let last = self.pending.len() - 1;
                &mut self.pending[last]
            }
        };

        if slot.index.is_none() {
            slot.index = delta.index;
        }
        if let Some(id) = delta.id.filter(|id| !id.is_empty()) {
            slot.id.get_or_insert(id);
        }
        if let Some(name) = delta.name.filter(|name| !name.is_empty()) {
            if slot.name.is_empty() {
                slot.name = name;
            }
        }
        slot.arguments.push_str(&delta.arguments);
    }

    fn find(&self, delta: &ToolCallDelta) -> Option<usize> {
        if let Some(index) = delta.index {
            let by_index = self.pending.iter().position(|call| call.index == Some(index));
            if by_index.is_some() {
                return by_index;
            }
        }
        if let Some(id) = delta.id.as_deref().filter(|id| !id.is_empty()) {
            return self
                .pending
                .iter()
                .position(|call| call.id.as_deref() == Some(id));
        }
        if delta.index.is_some() {
            return None;
        }
        // An anonymous fragment continues the most recent call.
        self.pending.len().checked_sub(1)
    }

    /// Completed calls in arrival order. Calls that never received a name
    /// are dropped; calls without an id get a generated one.
    pub(crate) fn finish(self) -> Vec<ToolCall> {
        self.pending
            .into_iter()
            .filter_map(|call| {
                if call.name.is_empty() {
                    log::warn!(
                        "dropping tool call without a name (arguments: {:?})",
                        call.arguments
                    );
                    return None;
                }
                let id = call
                    .id
                    .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple()));
                Some(ToolCall::new(id, call.name, call.arguments))
            })
            .collect()
    }
}

/// Drains a model stream into a response. Chunks after `Done` are ignored.
/// A stream that ends or errors before `Done` yields a partial response.
pub async fn assemble(
    mut stream: LLMStream,
    cancel: &CancellationToken,
    session_id: &str,
) -> Result<AssembledResponse, AssembleError> {
    let mut text = String::new();
    let mut updates = Vec::new();
    let mut calls = ToolCallAccumulator::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!("[{}] stream cancelled", session_id);
                return Err(AssembleError::Cancelled);
            }
            next = stream.next() => next,
        };

        let chunk = match next {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => {
                log::warn!("[{}] stream error: {}", session_id, e);
                return Err(partial(text, updates, calls, e.to_string()));
            }
            None => {
                log::warn!("[{}] stream ended without completion", session_id);
                return Err(partial(
                    text,
                    updates,
                    calls,
                    "stream ended without a completion signal".to_string(),
                ));
            }
        };

        updates.push(StreamUpdate {
            sequence: updates.len(),
            chunk: chunk.clone(),
        });

        match chunk {
            LLMChunk::Token(token) => text.push_str(&token),
            LLMChunk::ToolCalls(deltas) => {
                for delta in deltas {
                    calls.merge(delta);
                }
            }
            LLMChunk::Done => break,
        }
    }

    let tool_calls = calls.finish();
    log::debug!(
        "[{}] response complete: {} chars, {} tool call(s)",
        session_id,
        text.len(),
        tool_calls.len()
    );

    Ok(AssembledResponse {
        text,
        updates,
        tool_calls,
    })
}

fn partial(
    text: String,
    updates: Vec<StreamUpdate>,
    calls: ToolCallAccumulator,
    reason: String,
) -> AssembleError {
    AssembleError::Partial(PartialResponse {
        text,
        updates,
        tool_calls: calls.finish(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use toolchat_llm::LLMError;

    fn build_stream(chunks: Vec<toolchat_llm::provider::Result<LLMChunk>>) -> LLMStream {
        Box::pin(stream::iter(chunks))
    }

    fn fragment(index: usize, id: Option<&str>, name: Option<&str>, args: &str) -> LLMChunk {
        LLMChunk::ToolCalls(vec![ToolCallDelta {
            index: Some(index),
            id: id.map(str::to_string),
            name: name.map(str::to_string),
            arguments: args.to_string(),
        }])
    }

    #[tokio::test]
    async fn concatenates_tokens_in_order() {
        let stream = build_stream(vec![
            Ok(LLMChunk::Token("The price ".into())),
            Ok(LLMChunk::Token("is 40.".into())),
            Ok(LLMChunk::Done),
        ]);

        let response = assemble(stream, &CancellationToken::new(), "s")
            .await
            .unwrap();

        assert_eq!(response.text, "The price is 40.");
        assert!(response.tool_calls.is_empty());
        assert_eq!(response.updates.len(), 3);
        assert_eq!(response.updates[2].sequence, 2);
    }

    #[tokio::test]
    async fn merges_fragments_by_index() {
        let stream = build_stream(vec![
            Ok(fragment(0, Some("call_a"), Some("get_price"), "{\"product")),
            Ok(fragment(1, Some("call_b"), Some("get_stock"), "{}")),
            Ok(fragment(0, None, None, "_id\":7}")),
            Ok(LLMChunk::Done),
        ]);

        let response = assemble(stream, &CancellationToken::new(), "s")
            .await
            .unwrap();

        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.tool_calls[0].id, "call_a");
        assert_eq!(response.tool_calls[0].function.name, "get_price");
        assert_eq!(response.tool_calls[0].function.arguments, "{\"product_id\":7}");
        assert_eq!(response.tool_calls[1].function.name, "get_stock");
    }

    #[tokio::test]
    async fn whole_calls_without_index_are_kept_apart() {
        let stream = build_stream(vec![
            Ok(LLMChunk::ToolCalls(vec![
                ToolCallDelta::call("a", "one", "{}"),
                ToolCallDelta::call("b", "two", "{}"),
            ])),
            Ok(LLMChunk::Done),
        ]);

        let response = assemble(stream, &CancellationToken::new(), "s")
            .await
            .unwrap();

        let names: Vec<_> = response
            .tool_calls
            .iter()
            .map(|call| call.function.name.as_str())
            .collect();
        assert_eq!(names, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn late_index_joins_the_call_with_the_same_id() {
        let stream = build_stream(vec![
            Ok(LLMChunk::ToolCalls(vec![ToolCallDelta {
                index: None,
                id: Some("call_a".into()),
                name: Some("get_price".into()),
                arguments: "{\"id\":".into(),
            }])),
            Ok(fragment(0, Some("call_a"), None, "\"P\"}")),
            Ok(LLMChunk::Done),
        ]);

        let response = assemble(stream, &CancellationToken::new(), "s")
            .await
            .unwrap();

        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].id, "call_a");
        assert_eq!(response.tool_calls[0].function.arguments, "{\"id\":\"P\"}");
    }

    #[tokio::test]
    async fn drops_nameless_calls_and_generates_missing_ids() {
        let stream = build_stream(vec![
            Ok(fragment(0, None, Some("get_price"), "{}")),
            Ok(fragment(1, Some("orphan"), None, "{}")),
            Ok(LLMChunk::Done),
        ]);

        let response = assemble(stream, &CancellationToken::new(), "s")
            .await
            .unwrap();

        assert_eq!(response.tool_calls.len(), 1);
        assert!(response.tool_calls[0].id.starts_with("call_"));
        assert_eq!(response.tool_calls[0].function.name, "get_price");
    }

    #[tokio::test]
    async fn ignores_chunks_after_done() {
        let stream = build_stream(vec![
            Ok(LLMChunk::Token("done".into())),
            Ok(LLMChunk::Done),
            Ok(LLMChunk::Token(" and more".into())),
        ]);

        let response = assemble(stream, &CancellationToken::new(), "s")
            .await
            .unwrap();

        assert_eq!(response.text, "done");
        assert_eq!(response.updates.len(), 2);
    }

    #[tokio::test]
    async fn stream_without_done_is_partial() {
        let stream = build_stream(vec![Ok(LLMChunk::Token("half an ans".into()))]);

        match assemble(stream, &CancellationToken::new(), "s").await {
            Err(AssembleError::Partial(partial)) => {
                assert_eq!(partial.text, "half an ans");
                assert_eq!(partial.updates.len(), 1);
            }
            other => panic!("expected partial response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn stream_error_is_partial_with_reason() {
        let stream = build_stream(vec![
            Ok(fragment(0, Some("c"), Some("get_price"), "{")),
            Err(LLMError::Stream("connection reset".into())),
        ]);

        match assemble(stream, &CancellationToken::new(), "s").await {
            Err(AssembleError::Partial(partial)) => {
                assert!(partial.reason.contains("connection reset"));
                assert_eq!(partial.tool_calls.len(), 1);
            }
            other => panic!("expected partial response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn cancellation_wins_over_pending_chunks() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let stream = build_stream(vec![Ok(LLMChunk::Token("x".into())), Ok(LLMChunk::Done)]);

        assert!(matches!(
            assemble(stream, &cancel, "s").await,
            Err(AssembleError::Cancelled)
        ));
    }
}
