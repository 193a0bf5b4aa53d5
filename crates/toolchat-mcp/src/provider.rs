use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use toolchat_core::{
    normalize, validate_arguments, ContentBlock, ProviderError, RawToolMetadata, ToolDescriptor,
    ToolErrorCode, ToolInvocationResult, ToolProvider,
};

use crate::config::{McpServerConfig, TransportConfig};
use crate::error::{McpError, Result};
use crate::protocol::{McpProtocolClient, McpTransport};
use crate::transports::{SseTransport, StdioTransport};
use crate::types::{RuntimeInfo, ServerStatus};

/// Builds a fresh transport each time a session is (re)established.
pub type TransportFactory = Arc<dyn Fn() -> Result<Arc<dyn McpTransport>> + Send + Sync>;

/// Exposes one MCP server as a `ToolProvider`.
///
/// The session is opened on first use and re-opened on the next call after
/// it was lost. The catalog from the latest `tools/list` decides which names
/// `invoke` accepts.
pub struct McpToolProvider {
    config: McpServerConfig,
    factory: TransportFactory,
    session: Mutex<Option<Arc<McpProtocolClient>>>,
    catalog: RwLock<HashMap<String, ToolDescriptor>>,
    info: RwLock<RuntimeInfo>,
}

impl McpToolProvider {
    pub fn new(config: McpServerConfig) -> Self {
        let transport = config.transport.clone();
        let factory: TransportFactory = Arc::new(move || {
            let transport: Arc<dyn McpTransport> = match &transport {
                TransportConfig::Stdio(stdio) => Arc::new(StdioTransport::new(stdio.clone())),
                TransportConfig::Sse(sse) => Arc::new(SseTransport::new(sse.clone())),
            };
            Ok(transport)
        });
        Self::with_transport_factory(config, factory)
    }

    pub fn with_transport_factory(config: McpServerConfig, factory: TransportFactory) -> Self {
        let info = RuntimeInfo::new(config.id.clone());
        Self {
            config,
            factory,
            session: Mutex::new(None),
            catalog: RwLock::new(HashMap::new()),
            info: RwLock::new(info),
        }
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    pub fn info(&self) -> RuntimeInfo {
        self.info.read().clone()
    }

    async fn session(&self, timeout: Duration) -> Result<Arc<McpProtocolClient>> {
        let mut guard = self.session.lock().await;
        if let Some(client) = guard.as_ref() {
            if client.is_alive() {
                return Ok(Arc::clone(client));
            }
            info!("MCP server '{}' session lost, reconnecting", self.config.id);
        }
        *guard = None;

        let client = Arc::new(McpProtocolClient::new((self.factory)()?));
        client.connect().await?;

        let handshake_timeout = timeout.min(self.config.request_timeout());
        let initialized = match client.initialize(handshake_timeout).await {
            Ok(initialized) => initialized,
            Err(e) => {
                let _ = client.disconnect().await;
                return Err(e);
            }
        };

        info!(
            "MCP server '{}' ready ({} {})",
            self.config.id, initialized.server_info.name, initialized.server_info.version
        );
        {
            let mut info = self.info.write();
            info.status = ServerStatus::Ready;
            info.server_name = Some(initialized.server_info.name);
            info.connected_at = Some(Utc::now());
            info.last_error = None;
        }

        *guard = Some(Arc::clone(&client));
        Ok(client)
    }

    async fn record_failure(&self, error: &McpError) {
        if error.is_session_lost() {
            if let Some(client) = self.session.lock().await.take() {
                let _ = client.disconnect().await;
            }
        }
        let mut info = self.info.write();
        info.status = ServerStatus::Error;
        info.last_error = Some(error.to_string());
    }

    fn normalize_catalog(&self, raw_tools: Vec<Value>) -> Vec<ToolDescriptor> {
        let mut descriptors = Vec::with_capacity(raw_tools.len());

        for raw in raw_tools {
            let metadata = match serde_json::from_value::<RawToolMetadata>(raw) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("MCP server '{}' listed an unreadable tool: {}", self.config.id, e);
                    continue;
                }
            };
            let descriptor = match normalize(metadata) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    warn!("MCP server '{}': dropping tool: {}", self.config.id, e);
                    continue;
                }
            };
            if !self.config.is_tool_allowed(&descriptor.name) {
                debug!(
                    "MCP server '{}': tool '{}' filtered by configuration",
                    self.config.id, descriptor.name
                );
                continue;
            }
            descriptors.push(descriptor);
        }

        descriptors
    }

    async fn fetch_tools(&self, timeout: Duration) -> Result<Vec<ToolDescriptor>> {
        let client = self.session(timeout).await?;
        let raw_tools = client.list_tools(timeout).await?;
        Ok(self.normalize_catalog(raw_tools))
    }

    async fn call(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
        timeout: Duration,
    ) -> Result<ToolInvocationResult> {
        let client = self.session(timeout).await?;
        let result = client
            .call_tool(name, Value::Object(arguments.clone()), timeout)
            .await?;

        let content: Vec<ContentBlock> = result.content.into_iter().map(Into::into).collect();
        if result.is_error {
            let message = content
                .iter()
                .map(ContentBlock::to_text)
                .collect::<Vec<_>>()
                .join("\n");
            return Ok(ToolInvocationResult::failure(
                ToolErrorCode::ProviderExecutionError,
                message,
            ));
        }
        Ok(ToolInvocationResult::Success { content })
    }

    /// Closes the session if one is open.
    pub async fn shutdown(&self) {
        if let Some(client) = self.session.lock().await.take() {
            if let Err(e) = client.disconnect().await {
                warn!("Error disconnecting MCP server '{}': {}", self.config.id, e);
            }
        }
        self.info.write().status = ServerStatus::Stopped;
    }
}

#[async_trait]
impl ToolProvider for McpToolProvider {
    fn id(&self) -> &str {
        &self.config.id
    }

    async fn list_tools(&self, timeout: Duration) -> std::result::Result<Vec<ToolDescriptor>, ProviderError> {
        let outcome = match tokio::time::timeout(timeout, self.fetch_tools(timeout)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(McpError::Timeout(format!(
                "tools/list on '{}' exceeded {:?}",
                self.config.id, timeout
            ))),
        };

        match outcome {
            Ok(descriptors) => {
                debug!(
                    "MCP server '{}' offers {} tool(s)",
                    self.config.id,
                    descriptors.len()
                );
                *self.catalog.write() = descriptors
                    .iter()
                    .map(|descriptor| (descriptor.name.clone(), descriptor.clone()))
                    .collect();
                self.info.write().tool_count = descriptors.len();
                Ok(descriptors)
            }
            Err(e) => {
                warn!("MCP server '{}' discovery failed: {}", self.config.id, e);
                self.record_failure(&e).await;
                Err(e.to_provider_error(timeout))
            }
        }
    }

    async fn invoke(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
        timeout: Duration,
    ) -> ToolInvocationResult {
        let Some(descriptor) = self.catalog.read().get(name).cloned() else {
            return ToolInvocationResult::failure(
                ToolErrorCode::UnknownTool,
                format!("'{}' is not offered by MCP server '{}'", name, self.config.id),
            );
        };

        if let Err(e) = validate_arguments(&descriptor, arguments) {
            return ToolInvocationResult::failure(ToolErrorCode::InvalidArguments, e.to_string());
        }

        let outcome = match tokio::time::timeout(timeout, self.call(name, arguments, timeout)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return ToolInvocationResult::failure(
                    ToolErrorCode::Timeout,
                    format!("'{}' did not answer within {:?}", name, timeout),
                )
            }
        };

        match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!("MCP tool '{}' on '{}' failed: {}", name, self.config.id, e);
                if e.is_session_lost() {
                    self.record_failure(&e).await;
                }
                ToolInvocationResult::failure(e.invocation_code(), e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StdioConfig;
    use crate::protocol::{JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};
    use crate::transports::memory::{scripted_server, unreachable_server, MemoryTransport};
    use serde_json::json;

    fn server_config() -> McpServerConfig {
        McpServerConfig {
            id: "products".to_string(),
            name: None,
            enabled: true,
            transport: TransportConfig::Stdio(StdioConfig {
                command: "unused".to_string(),
                args: Vec::new(),
                cwd: None,
                env: Default::default(),
            }),
            request_timeout_ms: 60000,
            allowed_tools: Vec::new(),
            denied_tools: vec!["delete_product".to_string()],
        }
    }

    fn product_server(request: &JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id;
        match request.method.as_str() {
            "initialize" => Some(JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "serverInfo": { "name": "ProductServer", "version": "1.0" }
                }),
            )),
            "tools/list" => Some(JsonRpcResponse::success(
                id,
                json!({ "tools": [
                    {
                        "name": "get_product_by_id",
                        "description": "Gets a product by id",
                        "inputSchema": {
                            "type": "object",
                            "properties": { "id": { "type": "string" } },
                            "required": ["id"]
                        }
                    },
                    { "name": "broken", "inputSchema": "not a schema" },
                    { "description": "nameless" },
                    { "name": "delete_product", "inputSchema": { "type": "object" } },
                    { "name": "slow", "inputSchema": { "type": "object" } }
                ]}),
            )),
            "tools/call" => {
                let params = request.params.clone().unwrap_or_default();
                match (params["name"].as_str(), params["arguments"]["id"].as_str()) {
                    (Some("slow"), _) => None,
                    (_, Some("P")) => Some(JsonRpcResponse::success(
                        id,
                        json!({ "content": [{ "type": "text", "text": "42.00" }] }),
                    )),
                    (_, Some("missing")) => Some(JsonRpcResponse::success(
                        id,
                        json!({ "content": [{ "type": "text", "text": "Product not found" }], "isError": true }),
                    )),
                    _ => Some(JsonRpcResponse::failure(id, -32603, "internal error")),
                }
            }
            _ => Some(JsonRpcResponse::failure(id, -32601, "Method not found")),
        }
    }

    fn provider_with(transports: Arc<parking_lot::Mutex<Vec<Arc<MemoryTransport>>>>) -> McpToolProvider {
        let factory: TransportFactory = Arc::new(move || {
            let transport = scripted_server(product_server);
            transports.lock().push(Arc::clone(&transport));
            let transport: Arc<dyn McpTransport> = transport;
            Ok(transport)
        });
        McpToolProvider::with_transport_factory(server_config(), factory)
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn lists_tools_dropping_malformed_and_denied_entries() {
        let transports = Arc::default();
        let provider = provider_with(Arc::clone(&transports));

        let names: Vec<_> = provider
            .list_tools(Duration::from_secs(1))
            .await
            .unwrap()
            .into_iter()
            .map(|descriptor| descriptor.name)
            .collect();

        assert_eq!(names, vec!["get_product_by_id", "slow"]);
        assert_eq!(
            transports.lock()[0].sent_methods(),
            vec!["initialize", "notifications/initialized", "tools/list"]
        );
        assert_eq!(provider.info().status, ServerStatus::Ready);
        assert_eq!(provider.info().tool_count, 2);
    }

    #[tokio::test]
    async fn invoke_maps_replies_to_results() {
        let provider = provider_with(Arc::default());
        provider.list_tools(Duration::from_secs(1)).await.unwrap();
        let timeout = Duration::from_secs(1);

        assert_eq!(
            provider
                .invoke("get_product_by_id", &args(json!({ "id": "P" })), timeout)
                .await,
            ToolInvocationResult::text("42.00")
        );

        let not_found = provider
            .invoke("get_product_by_id", &args(json!({ "id": "missing" })), timeout)
            .await;
        assert_eq!(
            not_found,
            ToolInvocationResult::failure(ToolErrorCode::ProviderExecutionError, "Product not found")
        );

        let rpc_error = provider
            .invoke("get_product_by_id", &args(json!({ "id": "Q" })), timeout)
            .await;
        assert_eq!(rpc_error.error_code(), Some(ToolErrorCode::ProviderExecutionError));
    }

    #[tokio::test]
    async fn rejects_unlisted_tools_and_bad_arguments_locally() {
        let transports: Arc<parking_lot::Mutex<Vec<Arc<MemoryTransport>>>> = Arc::default();
        let provider = provider_with(Arc::clone(&transports));
        provider.list_tools(Duration::from_secs(1)).await.unwrap();
        let timeout = Duration::from_secs(1);

        let denied = provider.invoke("delete_product", &Map::new(), timeout).await;
        assert_eq!(denied.error_code(), Some(ToolErrorCode::UnknownTool));

        let invalid = provider
            .invoke("get_product_by_id", &args(json!({ "id": 5 })), timeout)
            .await;
        assert_eq!(invalid.error_code(), Some(ToolErrorCode::InvalidArguments));

        assert!(!transports.lock()[0]
            .sent_methods()
            .contains(&"tools/call".to_string()));
    }

    #[tokio::test]
    async fn unreachable_server_fails_discovery() {
        let factory: TransportFactory = Arc::new(|| {
            let transport: Arc<dyn McpTransport> = unreachable_server();
            Ok(transport)
        });
        let provider = McpToolProvider::with_transport_factory(server_config(), factory);

        assert!(matches!(
            provider.list_tools(Duration::from_secs(1)).await,
            Err(ProviderError::Unreachable(_))
        ));
        assert_eq!(provider.info().status, ServerStatus::Error);
    }

    #[tokio::test]
    async fn lost_session_is_reestablished_on_next_listing() {
        let transports: Arc<parking_lot::Mutex<Vec<Arc<MemoryTransport>>>> = Arc::default();
        let provider = provider_with(Arc::clone(&transports));
        provider.list_tools(Duration::from_secs(1)).await.unwrap();

        let first = Arc::clone(&transports.lock()[0]);
        first.close_from_server();
        tokio::time::sleep(Duration::from_millis(20)).await;

        provider.list_tools(Duration::from_secs(1)).await.unwrap();
        assert_eq!(transports.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_invocations_time_out() {
        let provider = provider_with(Arc::default());
        provider.list_tools(Duration::from_secs(1)).await.unwrap();

        let result = provider
            .invoke("slow", &Map::new(), Duration::from_secs(3))
            .await;
        assert_eq!(result.error_code(), Some(ToolErrorCode::Timeout));
    }

    #[tokio::test]
    async fn abandoned_handshake_releases_the_transport() {
        let transports: Arc<parking_lot::Mutex<Vec<Arc<MemoryTransport>>>> = Arc::default();
        let recorded = Arc::clone(&transports);
        let factory: TransportFactory = Arc::new(move || {
            let transport = scripted_server(|_| None);
            recorded.lock().push(Arc::clone(&transport));
            let transport: Arc<dyn McpTransport> = transport;
            Ok(transport)
        });
        let provider = McpToolProvider::with_transport_factory(server_config(), factory);

        for _ in 0..2 {
            assert!(matches!(
                provider.list_tools(Duration::from_millis(50)).await,
                Err(ProviderError::Timeout(_))
            ));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        let transports = transports.lock();
        assert_eq!(transports.len(), 2);
        for transport in transports.iter() {
            assert_eq!(Arc::strong_count(transport), 1);
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn silent_server_process_is_killed_after_handshake_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("server.pid");
        let mut config = server_config();
        config.transport = TransportConfig::Stdio(StdioConfig {
            command: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                format!("echo $$ > {}; exec sleep 600", pid_file.display()),
            ],
            cwd: None,
            env: Default::default(),
        });
        let provider = McpToolProvider::new(config);

        assert!(matches!(
            provider.list_tools(Duration::from_millis(300)).await,
            Err(ProviderError::Timeout(_))
        ));
        tokio::time::sleep(Duration::from_millis(200)).await;

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid.trim()));
        let running = match stat {
            Err(_) => false,
            Ok(stat) => {
                let state = stat
                    .rsplit_once(')')
                    .and_then(|(_, rest)| rest.trim_start().chars().next());
                state != Some('Z')
            }
        };
        assert!(!running, "server process {} still running", pid.trim());
    }

    #[tokio::test]
    async fn shutdown_marks_server_stopped() {
        let provider = provider_with(Arc::default());
        provider.list_tools(Duration::from_secs(1)).await.unwrap();
        provider.shutdown().await;
        assert_eq!(provider.info().status, ServerStatus::Stopped);
    }
}
