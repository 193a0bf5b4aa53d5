use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session state of one configured server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// Configured but no session opened yet.
    Idle,
    Ready,
    Error,
    Stopped,
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerStatus::Idle => write!(f, "idle"),
            ServerStatus::Ready => write!(f, "ready"),
            ServerStatus::Error => write!(f, "error"),
            ServerStatus::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub server_id: String,
    pub status: ServerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub tool_count: usize,
}

impl RuntimeInfo {
    pub fn new(server_id: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            status: ServerStatus::Idle,
            server_name: None,
            connected_at: None,
            last_error: None,
            tool_count: 0,
        }
    }
}
