//! The session capability the registry routes through, and the connector that opens
//! sessions from backend configuration.

use crate::rpc::{McpConnection, RpcTransport};
use crate::sse::connect_sse;
use crate::stdio::connect_stdio;
use async_trait::async_trait;
use std::sync::Arc;
use toolbridge_core::{
    BackendConfig, BackendTransport, ToolDescriptor, ToolbridgeError, ToolbridgeResult,
};

/// A live connection to one tool-hosting backend.
///
/// The registry only ever talks to backends through this trait, so tests and embedders
/// can plug in sessions that are not MCP servers at all.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Identifier used in the routing table and in logs.
    fn name(&self) -> &str;

    /// Tools offered by this backend, in the backend's order.
    async fn list_tools(&self) -> ToolbridgeResult<Vec<ToolDescriptor>>;

    /// Runs a tool and returns its text payload.
    async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> ToolbridgeResult<String>;

    /// Releases the connection.
    async fn close(&self) -> ToolbridgeResult<()>;
}

#[async_trait]
impl<T: RpcTransport + 'static> ToolSession for McpConnection<T> {
    fn name(&self) -> &str {
        self.server_name()
    }

    async fn list_tools(&self) -> ToolbridgeResult<Vec<ToolDescriptor>> {
        self.tools_list().await
    }

    async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> ToolbridgeResult<String> {
        let result = self.tools_call(name, arguments).await?;
        let text = result.text();
        if result.is_error {
            return Err(ToolbridgeError::Tool(text));
        }
        Ok(text)
    }

    async fn close(&self) -> ToolbridgeResult<()> {
        self.shutdown().await
    }
}

/// Opens a session for one backend.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Establishes and initializes the session. Failures are
    /// [`ToolbridgeError::Connection`].
    async fn connect(&self, backend: &BackendConfig) -> ToolbridgeResult<Arc<dyn ToolSession>>;
}

/// Connector for real MCP servers: stdio subprocesses and SSE endpoints.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransportConnector;

#[async_trait]
impl SessionConnector for TransportConnector {
    async fn connect(&self, backend: &BackendConfig) -> ToolbridgeResult<Arc<dyn ToolSession>> {
        match &backend.transport {
            BackendTransport::Stdio {
                command,
                args,
                env_vars,
            } => {
                let conn = connect_stdio(&backend.name, command, args, env_vars).await?;
                Ok(Arc::new(conn))
            }
            BackendTransport::Sse { sse_url } => {
                let conn = connect_sse(&backend.name, sse_url).await?;
                Ok(Arc::new(conn))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transport_connector_stdio_failure() {
        let backend = BackendConfig::stdio("fs", "/nonexistent/mcp-server", vec![]);
        let err = TransportConnector.connect(&backend).await.err().unwrap();
        assert!(matches!(err, ToolbridgeError::Connection(_)));
    }
}
