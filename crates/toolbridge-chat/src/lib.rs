//! Turn-bounded chat orchestration over MCP tools.
//!
//! - [`ChatOrchestrator`] drives the model ↔ tool loop for one conversation.
//! - [`WireCodec`] implementations encode chunks, tools and messages for the OpenAI
//!   and Anthropic dialects, and rebuild streamed tool calls through a
//!   [`ToolCallAccumulator`].
//! - [`ChatStream`] exposes a run as a `futures_util::Stream` of [`ChatChunk`]s.
//! - [`backends`] holds the streaming HTTP model clients.

/// Streamed tool-call reassembly.
pub mod accumulator;
/// HTTP model clients.
pub mod backends;
/// Synthetic and forwarded stream chunks.
pub mod chunk;
/// Per-dialect wire encoding.
pub mod codec;
/// Model and run configuration.
pub mod config;
/// Provider dialect selection.
pub mod dialect;
/// The model capability.
pub mod model;
/// The bounded chat loop.
pub mod orchestrator;
/// Tool schema normalization.
pub mod schema;
/// Pull-based stream over a run.
pub mod stream;

pub use accumulator::{FinalizedToolCall, ToolCallAccumulator};
pub use backends::{model_client, AnthropicClient, OpenAiClient};
pub use chunk::{AnthropicCompatibleChunk, ChatChunk, ChunkKind, OpenAiCompatibleChunk};
pub use codec::{make_chunk, AnthropicCodec, OpenAiCodec, TurnState, WireCodec};
pub use config::ChatConfig;
pub use dialect::Dialect;
pub use model::{ChunkStream, GenerationParams, ModelClient, ModelRequest};
pub use orchestrator::{ChatOrchestrator, ChatOutcome, Termination};
pub use schema::normalize_schema;
pub use stream::ChatStream;
