//! In-process transport that answers requests with a scripted handler.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{McpError, Result};
use crate::protocol::client::McpTransport;
use crate::protocol::models::{JsonRpcRequest, JsonRpcResponse};

type Handler = dyn Fn(&JsonRpcRequest) -> Option<JsonRpcResponse> + Send + Sync;

pub struct MemoryTransport {
    handler: Box<Handler>,
    reachable: bool,
    connected: AtomicBool,
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    sent: Mutex<Vec<String>>,
}

pub fn scripted_server<F>(handler: F) -> Arc<MemoryTransport>
where
    F: Fn(&JsonRpcRequest) -> Option<JsonRpcResponse> + Send + Sync + 'static,
{
    Arc::new(MemoryTransport::new(Box::new(handler), true))
}

pub fn unreachable_server() -> Arc<MemoryTransport> {
    Arc::new(MemoryTransport::new(Box::new(|_| None), false))
}

impl MemoryTransport {
    fn new(handler: Box<Handler>, reachable: bool) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            handler,
            reachable,
            connected: AtomicBool::new(false),
            inbound_tx: Mutex::new(Some(tx)),
            inbound_rx: tokio::sync::Mutex::new(rx),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Methods of every request and notification sent so far, in order.
    pub fn sent_methods(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Simulates the server going away.
    pub fn close_from_server(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.inbound_tx.lock().take();
    }
}

#[async_trait]
impl McpTransport for MemoryTransport {
    async fn connect(&self) -> Result<()> {
        if !self.reachable {
            return Err(McpError::Connection("connection refused".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.close_from_server();
        Ok(())
    }

    async fn send(&self, message: String) -> Result<()> {
        if !self.is_connected() {
            return Err(McpError::Disconnected);
        }

        let value: serde_json::Value = serde_json::from_str(&message)?;
        let method = value["method"].as_str().unwrap_or_default().to_string();
        self.sent.lock().push(method);

        if value.get("id").is_none() {
            return Ok(());
        }

        let request: JsonRpcRequest = serde_json::from_value(value)?;
        if let Some(response) = (self.handler)(&request) {
            let reply = serde_json::to_string(&response)?;
            if let Some(tx) = self.inbound_tx.lock().as_ref() {
                let _ = tx.send(reply);
            }
        }
        Ok(())
    }

    async fn receive(&self) -> Result<Option<String>> {
        Ok(self.inbound_rx.lock().await.recv().await)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
