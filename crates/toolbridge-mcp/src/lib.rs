//! MCP tool sessions and the multi-session registry.
//!
//! - [`McpConnection`] speaks JSON-RPC 2.0 to one MCP server over stdio or SSE.
//! - [`ToolSession`] is the capability the registry routes through.
//! - [`SessionRegistry`] connects every backend, builds the first-wins routing table,
//!   and routes tool invocations.

/// JSON-RPC envelopes and MCP payloads.
pub mod protocol;
/// Session registry and routing table.
pub mod registry;
/// Transport-independent JSON-RPC client.
pub mod rpc;
/// The session capability and its connector.
pub mod session;
/// MCP over server-sent events.
pub mod sse;
/// MCP over a subprocess's stdio.
pub mod stdio;

pub use registry::{SessionRegistry, SessionScope, ToolRoutingTable};
pub use rpc::{McpConnection, RpcTransport};
pub use session::{SessionConnector, ToolSession, TransportConnector};
pub use sse::{connect_sse, SseDecoder, SseEvent};
pub use stdio::connect_stdio;
