use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{HeaderConfig, SseConfig};
use crate::error::{McpError, Result};
use crate::protocol::client::McpTransport;

/// HTTP+SSE transport: replies arrive on a long-lived event stream, requests
/// are POSTed to the URL announced by the server's `endpoint` event.
///
/// Only this legacy handshake is spoken. Streamable HTTP endpoints (a single
/// URL answering POSTs, usually refusing GET with 405 or answering it with
/// JSON) are rejected at connect time with a `Connection` error.
pub struct SseTransport {
    config: SseConfig,
    client: Client,
    connected: Arc<AtomicBool>,
    endpoint: Mutex<Option<Url>>,
    messages: Mutex<Option<mpsc::Receiver<String>>>,
    stream_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl SseTransport {
    pub fn new(config: SseConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            connected: Arc::new(AtomicBool::new(false)),
            endpoint: Mutex::new(None),
            messages: Mutex::new(None),
            stream_task: Mutex::new(None),
        }
    }

    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for HeaderConfig { name, value } in &self.config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| McpError::InvalidConfig(format!("Invalid header name: {}", e)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| McpError::InvalidConfig(format!("Invalid header value: {}", e)))?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn connect(&self) -> Result<()> {
        info!("Connecting to MCP SSE endpoint: {}", self.config.url);

        let base = Url::parse(&self.config.url)
            .map_err(|e| McpError::InvalidConfig(format!("Invalid SSE url: {}", e)))?;
        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);

        let response = tokio::time::timeout(
            connect_timeout,
            self.client
                .get(base.clone())
                .headers(self.build_headers()?)
                .header(reqwest::header::ACCEPT, "text/event-stream")
                .send(),
        )
        .await
        .map_err(|_| McpError::Connection(format!("no response from {}", base)))?
        .map_err(|e| McpError::Connection(e.to_string()))?;

        if response.status() == reqwest::StatusCode::METHOD_NOT_ALLOWED {
            return Err(McpError::Connection(format!(
                "{} refused the SSE stream (405); Streamable HTTP endpoints are not supported",
                base
            )));
        }
        if !response.status().is_success() {
            return Err(McpError::Connection(format!(
                "HTTP error: {}",
                response.status()
            )));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with("text/event-stream") {
            return Err(McpError::Connection(format!(
                "{} answered with '{}' instead of an event stream; Streamable HTTP endpoints are not supported",
                base, content_type
            )));
        }

        let (message_tx, message_rx) = mpsc::channel(100);
        let (endpoint_tx, endpoint_rx) = oneshot::channel::<String>();
        let connected = Arc::clone(&self.connected);
        let url = self.config.url.clone();

        let handle = tokio::spawn(async move {
            let mut endpoint_tx = Some(endpoint_tx);
            let mut stream = response.bytes_stream().eventsource();
            while let Some(event) = stream.next().await {
                match event {
                    Ok(event) if event.event == "endpoint" => {
                        debug!("Got endpoint: {}", event.data);
                        if let Some(tx) = endpoint_tx.take() {
                            let _ = tx.send(event.data);
                        }
                    }
                    Ok(event) if event.event == "message" || event.event.is_empty() => {
                        if message_tx.send(event.data).await.is_err() {
                            break;
                        }
                    }
                    Ok(event) => debug!("Ignoring SSE event '{}'", event.event),
                    Err(e) => {
                        warn!("SSE stream error: {}", e);
                        break;
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
            warn!("SSE stream ended for {}", url);
        });

        let endpoint = match tokio::time::timeout(connect_timeout, endpoint_rx).await {
            Ok(Ok(endpoint)) => base
                .join(endpoint.trim())
                .map_err(|e| McpError::Protocol(format!("Invalid endpoint: {}", e)))?,
            Ok(Err(_)) => {
                return Err(McpError::Connection(
                    "SSE stream closed before announcing an endpoint".to_string(),
                ))
            }
            Err(_) => {
                handle.abort();
                return Err(McpError::Connection(
                    "server did not announce an endpoint".to_string(),
                ));
            }
        };

        info!("MCP SSE transport connected, posting to {}", endpoint);
        *self.endpoint.lock().await = Some(endpoint);
        *self.messages.lock().await = Some(message_rx);
        *self.stream_task.lock().await = Some(handle);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting MCP SSE transport");
        self.connected.store(false, Ordering::SeqCst);

        if let Some(handle) = self.stream_task.lock().await.take() {
            handle.abort();
        }
        self.endpoint.lock().await.take();
        Ok(())
    }

    async fn send(&self, message: String) -> Result<()> {
        let endpoint = self
            .endpoint
            .lock()
            .await
            .clone()
            .ok_or(McpError::Disconnected)?;

        let response = self
            .client
            .post(endpoint.clone())
            .headers(self.build_headers()?)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(message)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Transport(format!(
                "POST failed: {} - {}",
                status, body
            )));
        }

        debug!("Sent message via POST to {}", endpoint);
        Ok(())
    }

    async fn receive(&self) -> Result<Option<String>> {
        let mut guard = self.messages.lock().await;
        let messages = guard.as_mut().ok_or(McpError::Disconnected)?;
        Ok(messages.recv().await)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
