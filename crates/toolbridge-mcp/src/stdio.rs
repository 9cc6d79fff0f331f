//! MCP over stdio: spawn the server as a subprocess and exchange newline-delimited
//! JSON-RPC messages on its stdin/stdout.

use crate::rpc::{dispatch_message, fail_pending, pending_requests, McpConnection, RpcTransport};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;
use toolbridge_core::{ToolbridgeError, ToolbridgeResult};
use tracing::{debug, error};

/// Outbound half of a stdio session: the child's stdin plus the child handle.
pub struct StdioTransport {
    stdin: Mutex<ChildStdin>,
    child: Mutex<Child>,
}

#[async_trait]
impl RpcTransport for StdioTransport {
    async fn send(&self, message: String) -> ToolbridgeResult<()> {
        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(message.as_bytes())
            .await
            .map_err(|e| ToolbridgeError::Session(format!("Failed to write to MCP stdin: {e}")))?;
        stdin
            .write_all(b"\n")
            .await
            .map_err(|e| ToolbridgeError::Session(format!("Failed to write newline: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| ToolbridgeError::Session(format!("Failed to flush stdin: {e}")))?;
        Ok(())
    }

    async fn close(&self) -> ToolbridgeResult<()> {
        let mut child = self.child.lock().await;
        if child.try_wait()?.is_some() {
            return Ok(());
        }
        child.kill().await?;
        Ok(())
    }
}

/// Spawn an MCP server subprocess and perform the initialization handshake.
///
/// The child is killed when the returned connection is dropped.
pub async fn connect_stdio(
    server_name: &str,
    command: &str,
    args: &[String],
    env: &HashMap<String, String>,
) -> ToolbridgeResult<McpConnection<StdioTransport>> {
    let mut cmd = Command::new(command);
    cmd.args(args)
        .envs(env)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| {
        ToolbridgeError::Connection(format!("Failed to spawn MCP server '{command}': {e}"))
    })?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| ToolbridgeError::Connection("MCP server stdin not available".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ToolbridgeError::Connection("MCP server stdout not available".into()))?;

    let pending = pending_requests();

    let reader_pending = pending.clone();
    let reader_server = server_name.to_string();
    tokio::spawn(async move {
        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    debug!(server = %reader_server, "MCP server stdout closed");
                    break;
                }
                Ok(_) => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        dispatch_message(&reader_pending, trimmed, &reader_server).await;
                    }
                }
                Err(e) => {
                    error!(server = %reader_server, error = %e, "Error reading MCP server stdout");
                    break;
                }
            }
        }
        fail_pending(&reader_pending).await;
    });

    let transport = StdioTransport {
        stdin: Mutex::new(stdin),
        child: Mutex::new(child),
    };
    let connection = McpConnection::new(server_name, transport, pending);

    if let Err(e) = connection.handshake().await {
        let _ = connection.shutdown().await;
        return Err(ToolbridgeError::Connection(format!(
            "MCP handshake with '{server_name}' failed: {e}"
        )));
    }

    Ok(connection)
}
