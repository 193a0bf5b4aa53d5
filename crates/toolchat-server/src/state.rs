use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use toolchat_core::Conversation;
use toolchat_llm::LLMProvider;
use toolchat_loop::{Orchestrator, OrchestratorConfig};
use toolchat_mcp::McpServerManager;

pub type SharedConversation = Arc<Mutex<Conversation>>;

pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub mcp_manager: Arc<McpServerManager>,
    pub sessions: Arc<RwLock<HashMap<String, SharedConversation>>>,
    pub cancel_tokens: Arc<RwLock<HashMap<String, CancellationToken>>>,
}

impl AppState {
    /// Tool providers are taken from the MCP manager in configuration order.
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        mcp_manager: McpServerManager,
        config: OrchestratorConfig,
    ) -> Self {
        let orchestrator = Orchestrator::new(llm, mcp_manager.providers(), config);
        Self {
            orchestrator: Arc::new(orchestrator),
            mcp_manager: Arc::new(mcp_manager),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            cancel_tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn session(&self, session_id: &str) -> SharedConversation {
        if let Some(existing) = self.existing_session(session_id).await {
            return existing;
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                log::debug!("[{}] new session", session_id);
                Arc::new(Mutex::new(Conversation::new(session_id)))
            })
            .clone()
    }

    pub async fn existing_session(&self, session_id: &str) -> Option<SharedConversation> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Registers the cancellation token for a turn about to start.
    pub async fn begin_turn(&self, session_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.cancel_tokens
            .write()
            .await
            .insert(session_id.to_string(), token.clone());
        token
    }

    pub async fn end_turn(&self, session_id: &str) {
        self.cancel_tokens.write().await.remove(session_id);
    }

    /// Returns false when no turn is in flight for the session.
    pub async fn cancel(&self, session_id: &str) -> bool {
        match self.cancel_tokens.write().await.remove(session_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn remove_session(&self, session_id: &str) -> bool {
        let cancelled = self.cancel(session_id).await;
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if cancelled {
            log::info!("[{}] in-flight turn cancelled by delete", session_id);
        }
        removed
    }
}
