use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use crate::error::{McpError, Result};
use crate::protocol::models::*;

/// Transport trait for MCP communication
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    async fn send(&self, message: String) -> Result<()>;
    /// Waits for the next inbound message. `Ok(None)` means the peer closed.
    async fn receive(&self) -> Result<Option<String>>;
    fn is_connected(&self) -> bool;
}

type PendingMap = Mutex<HashMap<u64, oneshot::Sender<Result<JsonRpcResponse>>>>;

/// JSON-RPC session over one transport. Replies are matched to requests by id.
pub struct McpProtocolClient {
    transport: Arc<dyn McpTransport>,
    next_id: AtomicU64,
    pending: Arc<PendingMap>,
    alive: Arc<AtomicBool>,
    reader: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl McpProtocolClient {
    pub fn new(transport: Arc<dyn McpTransport>) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            alive: Arc::new(AtomicBool::new(false)),
            reader: Mutex::new(None),
        }
    }

    pub async fn connect(&self) -> Result<()> {
        self.transport.connect().await?;
        self.alive.store(true, Ordering::SeqCst);
        self.start_reader().await;
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
        fail_pending(&self.pending).await;
        self.transport.disconnect().await
    }

    /// False once the transport closed or the reader stopped.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && self.transport.is_connected()
    }

    async fn start_reader(&self) {
        let transport = Arc::clone(&self.transport);
        let pending = Arc::clone(&self.pending);
        let alive = Arc::clone(&self.alive);

        let handle = tokio::spawn(async move {
            loop {
                match transport.receive().await {
                    Ok(Some(message)) => {
                        if let Err(e) = Self::handle_message(&message, &pending).await {
                            warn!("Failed to handle MCP message: {}", e);
                        }
                    }
                    Ok(None) => {
                        debug!("MCP transport closed");
                        break;
                    }
                    Err(e) => {
                        warn!("MCP transport error: {}", e);
                        break;
                    }
                }
            }
            alive.store(false, Ordering::SeqCst);
            fail_pending(&pending).await;
        });

        *self.reader.lock().await = Some(handle);
    }

    async fn handle_message(message: &str, pending: &PendingMap) -> Result<()> {
        let value: Value = serde_json::from_str(message)?;

        if value.get("method").is_some() {
            // Server-initiated notifications and requests are not acted on.
            let method = value["method"].as_str().unwrap_or_default();
            debug!("Ignoring server message '{}'", method);
            return Ok(());
        }

        let response: JsonRpcResponse = serde_json::from_value(value)?;
        let Some(id) = response.id else {
            let reason = response
                .error
                .map(|error| error.message)
                .unwrap_or_else(|| "response without id".to_string());
            return Err(McpError::Protocol(reason));
        };

        match pending.lock().await.remove(&id) {
            Some(sender) => {
                let _ = sender.send(Ok(response));
                Ok(())
            }
            None => Err(McpError::Protocol(format!("reply for unknown request {id}"))),
        }
    }

    async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        if !self.is_alive() {
            return Err(McpError::Disconnected);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request_json = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        debug!("-> {} #{}", method, id);
        if let Err(e) = self.transport.send(request_json).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let response = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response?,
            Ok(Err(_)) => return Err(McpError::Disconnected),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(McpError::Timeout(format!(
                    "{} #{} timed out after {:?}",
                    method, id, timeout
                )));
            }
        };

        if let Some(error) = response.error {
            return Err(McpError::Server {
                code: error.code,
                message: error.message,
            });
        }
        response
            .result
            .ok_or_else(|| McpError::Protocol(format!("{method} reply has no result")))
    }

    async fn notify(&self, method: &str) -> Result<()> {
        let notification = serde_json::to_string(&JsonRpcNotification::new(method))?;
        self.transport.send(notification).await
    }

    /// Runs the `initialize` handshake and confirms it with
    /// `notifications/initialized`.
    pub async fn initialize(&self, timeout: Duration) -> Result<McpInitializeResult> {
        let params = serde_json::to_value(McpInitializeRequest::default())?;
        let result = self.send_request("initialize", Some(params), timeout).await?;
        let result: McpInitializeResult = serde_json::from_value(result)?;

        self.notify("notifications/initialized").await?;
        Ok(result)
    }

    /// Lists every tool, following pagination cursors.
    pub async fn list_tools(&self, timeout: Duration) -> Result<Vec<Value>> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor
                .take()
                .map(|cursor| serde_json::json!({ "cursor": cursor }));
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let result = self.send_request("tools/list", params, remaining).await?;
            let page: McpToolListResult = serde_json::from_value(result)?;

            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(tools)
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<McpToolCallResult> {
        let params = serde_json::to_value(McpToolCallRequest {
            name: name.to_string(),
            arguments,
        })?;
        let result = self.send_request("tools/call", Some(params), timeout).await?;
        Ok(serde_json::from_value(result)?)
    }
}

impl Drop for McpProtocolClient {
    fn drop(&mut self) {
        // The reader owns a transport handle; stopping it lets the transport
        // (and a stdio child) go away with the client.
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

async fn fail_pending(pending: &PendingMap) {
    for (_, sender) in pending.lock().await.drain() {
        let _ = sender.send(Err(McpError::Disconnected));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transports::memory::{scripted_server, MemoryTransport};
    use serde_json::json;

    fn echo_server() -> Arc<MemoryTransport> {
        scripted_server(|request| match request.method.as_str() {
            "initialize" => Some(JsonRpcResponse::success(
                request.id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "McpServer", "version": "1.0.0" }
                }),
            )),
            "tools/list" => Some(JsonRpcResponse::success(
                request.id,
                json!({ "tools": [{ "name": "echo", "inputSchema": { "type": "object" } }] }),
            )),
            "tools/call" => {
                let message = request.params.as_ref().and_then(|p| p["arguments"]["message"].as_str());
                match message {
                    Some(message) => Some(JsonRpcResponse::success(
                        request.id,
                        json!({ "content": [{ "type": "text", "text": format!("Echo: {message}") }] }),
                    )),
                    None => Some(JsonRpcResponse::failure(
                        request.id,
                        -32602,
                        "Missing required argument: message",
                    )),
                }
            }
            "slow" => None,
            _ => Some(JsonRpcResponse::failure(request.id, -32601, "Method not found")),
        })
    }

    #[tokio::test]
    async fn handshake_list_and_call() {
        let transport = echo_server();
        let client = McpProtocolClient::new(transport.clone());
        client.connect().await.unwrap();

        let info = client.initialize(Duration::from_secs(1)).await.unwrap();
        assert_eq!(info.server_info.name, "McpServer");
        assert!(transport
            .sent_methods()
            .contains(&"notifications/initialized".to_string()));

        let tools = client.list_tools(Duration::from_secs(1)).await.unwrap();
        assert_eq!(tools[0]["name"], "echo");

        let result = client
            .call_tool("echo", json!({ "message": "hi" }), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!result.is_error);
        assert!(matches!(&result.content[0], McpContentItem::Text { text } if text == "Echo: hi"));
    }

    #[tokio::test]
    async fn json_rpc_errors_become_server_errors() {
        let client = McpProtocolClient::new(echo_server());
        client.connect().await.unwrap();

        let error = client
            .call_tool("echo", json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(error, McpError::Server { code: -32602, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_requests_time_out() {
        let client = McpProtocolClient::new(echo_server());
        client.connect().await.unwrap();

        let error = client
            .send_request("slow", None, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(error, McpError::Timeout(_)));
        assert!(client.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn closing_the_transport_fails_pending_requests() {
        let transport = echo_server();
        let client = McpProtocolClient::new(transport.clone());
        client.connect().await.unwrap();

        let closer = transport.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            closer.close_from_server();
        });

        let error = client
            .send_request("slow", None, Duration::from_secs(30))
            .await
            .unwrap_err();
        assert!(matches!(error, McpError::Disconnected));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!client.is_alive());
    }

    #[tokio::test]
    async fn dropping_the_client_releases_the_transport() {
        let transport = echo_server();
        let client = McpProtocolClient::new(transport.clone());
        client.connect().await.unwrap();
        assert_eq!(Arc::strong_count(&transport), 3);

        drop(client);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(Arc::strong_count(&transport), 1);
    }
}
