use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use toolchat_llm::OpenAIProvider;
use toolchat_loop::OrchestratorConfig;
use toolchat_mcp::{McpConfig, McpServerManager};

use crate::handlers;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub port: u16,
    pub llm_base_url: String,
    pub model: String,
    pub api_key: String,
    pub mcp_config: Option<PathBuf>,
    pub max_rounds: usize,
    pub max_output_tokens: u32,
}

impl ServerSettings {
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_rounds: self.max_rounds,
            model: Some(self.model.clone()),
            max_output_tokens: self.max_output_tokens,
            ..Default::default()
        }
    }
}

pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/chat", web::post().to(handlers::chat::handler))
            .route(
                "/stop/{session_id}",
                web::post().to(handlers::stop::handler),
            )
            .route(
                "/history/{session_id}",
                web::get().to(handlers::history::handler),
            )
            .route(
                "/sessions/{session_id}",
                web::delete().to(handlers::delete::handler),
            )
            .route("/tools", web::get().to(handlers::tools::handler))
            .route("/health", web::get().to(handlers::health::handler)),
    );
}

fn load_mcp_manager(path: Option<&PathBuf>) -> io::Result<McpServerManager> {
    let Some(path) = path else {
        log::info!("No MCP configuration given, running without tool servers");
        return Ok(McpServerManager::new());
    };

    log::info!("Loading MCP configuration from {:?}", path);
    let config = McpConfig::from_file(path).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid MCP configuration {:?}: {}", path, e),
        )
    })?;
    Ok(McpServerManager::from_config(&config))
}

/// Lists every provider once at startup so name collisions surface early.
async fn check_catalog(state: &AppState) {
    let catalog = state.orchestrator.discover_tools().await;
    log::info!(
        "Tool catalog: {} tool(s) from {} provider(s)",
        catalog.index.len(),
        state.orchestrator.providers().len()
    );
    for conflict in catalog.index.conflicts() {
        log::warn!(
            "Ambiguous tool name '{}': '{}' wins over '{}'",
            conflict.tool_name,
            conflict.winner,
            conflict.shadowed
        );
    }
    for (provider, error) in &catalog.failures {
        log::warn!("Provider '{}' unavailable at startup: {}", provider, error);
    }
}

pub async fn run_server(settings: ServerSettings) -> io::Result<()> {
    log::info!(
        "Initializing server with base URL: {}, model: {}",
        settings.llm_base_url,
        settings.model
    );

    let llm = OpenAIProvider::new(settings.api_key.clone())
        .with_base_url(settings.llm_base_url.clone())
        .with_model(settings.model.clone());
    let mcp_manager = load_mcp_manager(settings.mcp_config.as_ref())?;
    let state = web::Data::new(AppState::new(
        Arc::new(llm),
        mcp_manager,
        settings.orchestrator_config(),
    ));

    check_catalog(&state).await;

    let app_state = state.clone();
    let result = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(Cors::permissive())
            .configure(app_config)
    })
    .shutdown_timeout(5)
    .bind(format!("0.0.0.0:{}", settings.port))?
    .run()
    .await;

    log::info!("Shutting down tool servers");
    let shutdown = state.mcp_manager.shutdown_all();
    if tokio::time::timeout(Duration::from_secs(5), shutdown)
        .await
        .is_err()
    {
        log::warn!("Tool servers did not shut down within 5s");
    }

    result
}
