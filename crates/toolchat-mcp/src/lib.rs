//! Model Context Protocol client: connects to MCP servers over stdio or SSE
//! and exposes their tools as a `ToolProvider`.

pub mod config;
pub mod error;
pub mod protocol;
pub mod transports;
pub mod types;

pub mod manager;
pub mod provider;

pub use config::*;
pub use error::{McpError, Result};
pub use manager::McpServerManager;
pub use protocol::*;
pub use provider::{McpToolProvider, TransportFactory};
pub use transports::*;
pub use types::*;
