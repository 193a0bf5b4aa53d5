use std::sync::Arc;
use tracing::info;

use toolchat_core::ToolProvider;

use crate::config::McpConfig;
use crate::provider::McpToolProvider;
use crate::types::RuntimeInfo;

/// Owns one `McpToolProvider` per enabled server, in configuration order.
#[derive(Default)]
pub struct McpServerManager {
    providers: Vec<Arc<McpToolProvider>>,
}

impl McpServerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions are opened lazily, so this never touches the network.
    pub fn from_config(config: &McpConfig) -> Self {
        let providers = config
            .servers
            .iter()
            .filter(|server| {
                if !server.enabled {
                    info!("MCP server '{}' is disabled, skipping", server.id);
                }
                server.enabled
            })
            .map(|server| Arc::new(McpToolProvider::new(server.clone())))
            .collect();

        Self { providers }
    }

    pub fn add_provider(&mut self, provider: Arc<McpToolProvider>) {
        self.providers.push(provider);
    }

    /// Providers in registration order, ready to hand to the orchestrator.
    pub fn providers(&self) -> Vec<Arc<dyn ToolProvider>> {
        self.providers
            .iter()
            .map(|provider| Arc::clone(provider) as Arc<dyn ToolProvider>)
            .collect()
    }

    pub fn list_servers(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|provider| provider.config().id.clone())
            .collect()
    }

    pub fn server_infos(&self) -> Vec<RuntimeInfo> {
        self.providers.iter().map(|provider| provider.info()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub async fn shutdown_all(&self) {
        for provider in &self.providers {
            provider.shutdown().await;
        }
    }
}
