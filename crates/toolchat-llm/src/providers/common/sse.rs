//! Turns a `text/event-stream` HTTP response into an [`LLMStream`].

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::Response;

use crate::provider::{LLMError, LLMStream, Result};
use crate::types::LLMChunk;

/// `handler` gets the event name and data of each SSE event and returns the
/// chunks to emit, in order (possibly none), or an error which is surfaced as
/// `LLMError::Stream`.
pub fn llm_stream_from_sse<H>(response: Response, mut handler: H) -> LLMStream
where
    H: FnMut(&str, &str) -> Result<Vec<LLMChunk>> + Send + 'static,
{
    let stream = response
        .bytes_stream()
        .eventsource()
        .flat_map(move |event| {
            let items: Vec<Result<LLMChunk>> = match event {
                Err(error) => vec![Err(LLMError::Stream(error.to_string()))],
                Ok(event) => match handler(&event.event, &event.data) {
                    Ok(chunks) => chunks.into_iter().map(Ok).collect(),
                    Err(LLMError::Stream(message)) => vec![Err(LLMError::Stream(message))],
                    Err(other) => vec![Err(LLMError::Stream(other.to_string()))],
                },
            };
            futures::stream::iter(items)
        });

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn sse_response(body: &'static str) -> (MockServer, Response) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let response = reqwest::Client::new()
            .get(format!("{}/sse", server.uri()))
            .send()
            .await
            .expect("response");
        (server, response)
    }

    #[tokio::test]
    async fn skips_events_the_handler_ignores() {
        let (_server, response) = sse_response(concat!(
            "event: token\ndata: hello\n\n",
            "event: ping\ndata: \n\n",
            "data: done\n\n",
        ))
        .await;

        let stream = llm_stream_from_sse(response, |event, data| match (event, data) {
            ("ping", _) => Ok(Vec::new()),
            (_, "done") => Ok(vec![LLMChunk::Done]),
            (event, data) => Ok(vec![LLMChunk::Token(format!("{event}:{data}"))]),
        });

        let chunks: Vec<_> = stream.map(|item| item.expect("chunk")).collect().await;
        assert_eq!(
            chunks,
            vec![LLMChunk::Token("token:hello".to_string()), LLMChunk::Done]
        );
    }

    #[tokio::test]
    async fn handler_errors_surface_as_stream_errors() {
        let (_server, response) = sse_response("data: {broken\n\n").await;

        let mut stream = llm_stream_from_sse(response, |_event, data| {
            serde_json::from_str::<serde_json::Value>(data)?;
            Ok(Vec::new())
        });

        match stream.next().await {
            Some(Err(LLMError::Stream(message))) => assert!(message.contains("JSON error")),
            other => panic!("expected a stream error, got {other:?}"),
        }
    }
}
