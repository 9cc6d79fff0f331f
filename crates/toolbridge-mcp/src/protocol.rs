//! JSON-RPC 2.0 envelopes and the MCP payloads toolbridge reads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use toolbridge_core::{ToolbridgeError, ToolbridgeResult};

/// Protocol revision announced during `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Outbound message. Without an `id` it is a notification and gets no reply.
#[derive(Debug, Clone, Serialize)]
pub struct RpcMessage<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl<'a> RpcMessage<'a> {
    /// A request expecting a reply with the same `id`.
    pub fn request(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: Some(id),
            method,
            params,
        }
    }

    /// A notification; `params` defaults to an empty object.
    pub fn notification(method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: None,
            method,
            params: Some(params.unwrap_or_else(|| serde_json::json!({}))),
        }
    }
}

/// Inbound reply, matched to its request by `id`.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcReply {
    /// Absent on server-initiated notifications.
    pub id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcFault>,
}

#[derive(Debug, Clone, Deserialize)]
struct RpcFault {
    code: i64,
    message: String,
}

impl RpcReply {
    /// The `result` payload; a JSON-RPC error or a missing result is a session error.
    pub fn into_result(self, method: &str) -> ToolbridgeResult<Value> {
        if let Some(fault) = self.error {
            return Err(ToolbridgeError::Session(format!(
                "MCP error {} on '{method}': {}",
                fault.code, fault.message
            )));
        }
        self.result
            .ok_or_else(|| ToolbridgeError::Session(format!("Empty '{method}' result")))
    }
}

/// What a server announces in its `initialize` result.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerHello {
    /// Protocol revision the server chose.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    #[serde(default)]
    capabilities: Value,
    #[serde(default, rename = "serverInfo")]
    server_info: Option<ServerIdentity>,
}

#[derive(Debug, Clone, Deserialize)]
struct ServerIdentity {
    name: String,
    #[serde(default)]
    version: String,
}

impl ServerHello {
    /// Whether the server declared the `tools` capability.
    pub fn offers_tools(&self) -> bool {
        self.capabilities.get("tools").is_some_and(|t| !t.is_null())
    }

    /// `name version` as reported by the server, or `unknown`.
    pub fn identity(&self) -> String {
        match &self.server_info {
            Some(info) if info.version.is_empty() => info.name.clone(),
            Some(info) => format!("{} {}", info.name, info.version),
            None => "unknown".to_string(),
        }
    }
}

/// Result of `tools/call`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallResult {
    #[serde(default)]
    content: Vec<ContentBlock>,
    /// Set when the tool itself reported a failure.
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl ToolCallResult {
    /// Concatenates every text block, newline separated. Non-text blocks are skipped.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
