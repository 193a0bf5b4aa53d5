use clap::Parser;
use std::io;
use std::path::PathBuf;

use toolchat_server::logging::init_logging;
use toolchat_server::{run_server, ServerSettings};

#[derive(Parser, Debug, Clone)]
#[command(name = "toolchat-server")]
#[command(about = "Tool-augmented chat server")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, env = "DEBUG", default_value = "false")]
    debug: bool,

    /// Server port
    #[arg(long, env = "PORT", default_value = "8081")]
    port: u16,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "LLM_BASE_URL", default_value = "https://api.openai.com/v1")]
    llm_base_url: String,

    /// Model name
    #[arg(long, env = "LLM_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    /// API key; empty sends no Authorization header
    #[arg(long, env = "LLM_API_KEY", default_value = "")]
    api_key: String,

    /// Path to the MCP server list (mcp.json)
    #[arg(long, env = "MCP_CONFIG")]
    mcp_config: Option<PathBuf>,

    /// Model invocations allowed per prompt
    #[arg(long, env = "MAX_ROUNDS", default_value = "8")]
    max_rounds: usize,

    /// Output token cap per model invocation
    #[arg(long, env = "MAX_OUTPUT_TOKENS", default_value = "1000")]
    max_output_tokens: u32,
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    log::info!("Starting toolchat server on port {}", cli.port);
    log::info!("  Base URL: {}", cli.llm_base_url);
    log::info!("  Model: {}", cli.model);
    log::debug!("  Max rounds: {}", cli.max_rounds);
    log::debug!("  Max output tokens: {}", cli.max_output_tokens);

    run_server(ServerSettings {
        port: cli.port,
        llm_base_url: cli.llm_base_url,
        model: cli.model,
        api_key: cli.api_key,
        mcp_config: cli.mcp_config,
        max_rounds: cli.max_rounds,
        max_output_tokens: cli.max_output_tokens,
    })
    .await
}
