use async_trait::async_trait;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::StdioConfig;
use crate::error::{McpError, Result};
use crate::protocol::client::McpTransport;

/// Runs the server as a child process speaking newline-delimited JSON-RPC.
pub struct StdioTransport {
    config: StdioConfig,
    child: Mutex<Option<Child>>,
    stdin: Mutex<Option<ChildStdin>>,
    lines: Mutex<Option<mpsc::Receiver<String>>>,
    connected: Arc<AtomicBool>,
}

impl StdioTransport {
    pub fn new(config: StdioConfig) -> Self {
        Self {
            config,
            child: Mutex::new(None),
            stdin: Mutex::new(None),
            lines: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn connect(&self) -> Result<()> {
        info!(
            "Starting MCP server process: {} {:?}",
            self.config.command, self.config.args
        );

        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &self.config.cwd {
            cmd.current_dir(cwd);
        }

        if !self.config.env.is_empty() {
            cmd.envs(&self.config.env);
        }

        let mut child = cmd.spawn().map_err(|e| {
            error!("Failed to spawn MCP server process: {}", e);
            McpError::Connection(format!("Failed to spawn '{}': {}", self.config.command, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Transport("Failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Transport("Failed to capture stdout".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[MCP server stderr] {}", line);
                }
            });
        }

        self.connected.store(true, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(100);
        let connected = Arc::clone(&self.connected);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        if tx.send(line.to_string()).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        warn!("MCP server stdout closed (EOF)");
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read MCP server stdout: {}", e);
                        break;
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
        });

        *self.child.lock().await = Some(child);
        *self.stdin.lock().await = Some(stdin);
        *self.lines.lock().await = Some(rx);

        info!("MCP server process started");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting MCP server process");
        self.connected.store(false, Ordering::SeqCst);

        // Closing stdin signals EOF to the server.
        self.stdin.lock().await.take();

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
                Ok(Ok(status)) => info!("MCP server process exited: {}", status),
                _ => {
                    warn!("MCP server process did not exit, killing");
                    let _ = child.kill().await;
                }
            }
        }

        Ok(())
    }

    async fn send(&self, message: String) -> Result<()> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(McpError::Disconnected)?;

        stdin
            .write_all(format!("{}\n", message).as_bytes())
            .await
            .map_err(|e| McpError::Transport(format!("Failed to write: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| McpError::Transport(format!("Failed to flush: {}", e)))?;

        debug!("Sent: {}", message);
        Ok(())
    }

    async fn receive(&self) -> Result<Option<String>> {
        let mut guard = self.lines.lock().await;
        let lines = guard.as_mut().ok_or(McpError::Disconnected)?;
        Ok(lines.recv().await)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
