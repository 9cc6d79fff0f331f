//! Transport-independent JSON-RPC 2.0 plumbing shared by the stdio and SSE sessions.

use crate::protocol::{RpcMessage, RpcReply, ServerHello, ToolCallResult, PROTOCOL_VERSION};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use toolbridge_core::{ToolDescriptor, ToolbridgeError, ToolbridgeResult};
use tracing::{debug, info, warn};

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Requests awaiting a response, keyed by JSON-RPC id.
pub(crate) type PendingRequests = Arc<Mutex<HashMap<u64, oneshot::Sender<RpcReply>>>>;

pub(crate) fn pending_requests() -> PendingRequests {
    Arc::new(Mutex::new(HashMap::new()))
}

/// Routes one inbound JSON message to the request waiting on its id.
///
/// Notifications (no id) and unparseable lines are logged and ignored.
pub(crate) async fn dispatch_message(pending: &PendingRequests, raw: &str, server: &str) {
    match serde_json::from_str::<RpcReply>(raw) {
        Ok(reply) => {
            if let Some(id) = reply.id {
                let mut map = pending.lock().await;
                if let Some(tx) = map.remove(&id) {
                    let _ = tx.send(reply);
                }
            }
        }
        Err(e) => {
            debug!(server = %server, line = %raw, error = %e, "Non-JSON-RPC message from MCP server");
        }
    }
}

/// Fails every outstanding request once the inbound side is gone.
pub(crate) async fn fail_pending(pending: &PendingRequests) {
    pending.lock().await.clear();
}

/// The outbound half of an MCP connection.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Delivers one serialized JSON-RPC message.
    async fn send(&self, message: String) -> ToolbridgeResult<()>;

    /// Tears the connection down. Must be safe to call more than once.
    async fn close(&self) -> ToolbridgeResult<()>;
}

/// A JSON-RPC client bound to one MCP server over some transport.
pub struct McpConnection<T: RpcTransport> {
    transport: T,
    pending: PendingRequests,
    next_id: AtomicU64,
    server_name: String,
}

impl<T: RpcTransport> McpConnection<T> {
    pub(crate) fn new(server_name: impl Into<String>, transport: T, pending: PendingRequests) -> Self {
        Self {
            transport,
            pending,
            next_id: AtomicU64::new(1),
            server_name: server_name.into(),
        }
    }

    /// Get the server name.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    /// Send a JSON-RPC request and wait for its `result`.
    async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> ToolbridgeResult<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let msg = serde_json::to_string(&RpcMessage::request(id, method, params))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if let Err(e) = self.transport.send(msg).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let reply = tokio::time::timeout(REQUEST_TIMEOUT, rx)
            .await
            .map_err(|_| {
                ToolbridgeError::Session(format!(
                    "MCP request '{}' to '{}' timed out",
                    method, self.server_name
                ))
            })?
            .map_err(|_| {
                ToolbridgeError::Session(format!(
                    "MCP server '{}' closed before answering '{}'",
                    self.server_name, method
                ))
            })?;

        reply.into_result(method)
    }

    /// Send a JSON-RPC notification (no response expected).
    async fn notify(&self, method: &str, params: Option<serde_json::Value>) -> ToolbridgeResult<()> {
        let msg = serde_json::to_string(&RpcMessage::notification(method, params))?;
        self.transport.send(msg).await
    }

    /// Perform the MCP initialize handshake, then announce `notifications/initialized`.
    ///
    /// A server that does not declare the `tools` capability is rejected before the
    /// notification is sent.
    pub async fn handshake(&self) -> ToolbridgeResult<ServerHello> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "toolbridge",
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let hello: ServerHello =
            serde_json::from_value(self.request("initialize", Some(params)).await?)?;
        if !hello.offers_tools() {
            warn!(server = %self.server_name, identity = %hello.identity(), "MCP server offers no tools");
            return Err(ToolbridgeError::Session(format!(
                "MCP server '{}' does not declare the tools capability",
                self.server_name
            )));
        }

        self.notify("notifications/initialized", None).await?;

        info!(
            server = %self.server_name,
            identity = %hello.identity(),
            version = %hello.protocol_version,
            "MCP server initialized"
        );
        Ok(hello)
    }

    /// `tools/list`.
    pub async fn tools_list(&self) -> ToolbridgeResult<Vec<ToolDescriptor>> {
        let result = self.request("tools/list", None).await?;
        let tools: Vec<ToolDescriptor> = serde_json::from_value(
            result
                .get("tools")
                .cloned()
                .unwrap_or(serde_json::json!([])),
        )?;
        Ok(tools)
    }

    /// `tools/call`.
    pub async fn tools_call(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> ToolbridgeResult<ToolCallResult> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });

        let result = self.request("tools/call", Some(params)).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Close the underlying transport.
    pub async fn shutdown(&self) -> ToolbridgeResult<()> {
        self.transport.close().await?;
        fail_pending(&self.pending).await;
        Ok(())
    }
}
