use std::sync::Arc;
use std::time::Duration;

use toolchat_core::{ProviderError, ToolIndex, ToolProvider};

/// Result of one discovery cycle across all registered providers.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    pub index: Arc<ToolIndex>,
    /// Providers that contributed nothing this cycle, with the reason.
    pub failures: Vec<(String, ProviderError)>,
}

/// Lists tools from each provider in registration order. A provider that
/// fails or exceeds `timeout` contributes an empty catalog.
pub async fn discover(
    providers: &[Arc<dyn ToolProvider>],
    timeout: Duration,
    session_id: &str,
) -> Catalog {
    let mut catalogs = Vec::with_capacity(providers.len());
    let mut failures = Vec::new();

    for provider in providers {
        let listed = match tokio::time::timeout(timeout, provider.list_tools(timeout)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(timeout)),
        };

        match listed {
            Ok(descriptors) => {
                log::debug!(
                    "[{}] provider '{}' listed {} tool(s)",
                    session_id,
                    provider.id(),
                    descriptors.len()
                );
                catalogs.push((Arc::clone(provider), descriptors));
            }
            Err(e) => {
                log::warn!(
                    "[{}] provider '{}' unavailable for this turn: {}",
                    session_id,
                    provider.id(),
                    e
                );
                failures.push((provider.id().to_string(), e));
            }
        }
    }

    let index = ToolIndex::build(catalogs);
    for conflict in index.conflicts() {
        log::warn!(
            "[{}] tool '{}' from '{}' is shadowed by '{}'",
            session_id,
            conflict.tool_name,
            conflict.shadowed,
            conflict.winner
        );
    }

    Catalog {
        index: Arc::new(index),
        failures,
    }
}
