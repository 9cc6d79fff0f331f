//! Dialect-specific encoding of chunks, tools and conversation messages.
//!
//! A [`WireCodec`] is chosen once per run through [`Dialect::codec`]; the orchestrator
//! never branches on the provider itself.

mod anthropic;
mod openai;

pub use anthropic::AnthropicCodec;
pub use openai::OpenAiCodec;

use crate::accumulator::{FinalizedToolCall, ToolCallAccumulator};
use crate::chunk::{ChatChunk, ChunkKind};
use crate::dialect::Dialect;
use serde_json::Value;
use toolbridge_core::{ChatMessage, ToolDescriptor, ToolbridgeResult};

/// What one model call has produced so far.
#[derive(Debug, Default)]
pub struct TurnState {
    /// Tool-call fragments.
    pub accumulator: ToolCallAccumulator,
    /// Concatenated assistant text deltas.
    pub text: String,
}

impl TurnState {
    /// State for a fresh model turn.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the turn requested any tool.
    pub fn has_tool_calls(&self) -> bool {
        !self.accumulator.is_empty()
    }
}

/// Encoding rules of one provider dialect.
pub trait WireCodec: Send + Sync {
    /// The dialect this codec encodes.
    fn dialect(&self) -> Dialect;

    /// Builds a synthetic chunk in this dialect's shape.
    fn make_chunk(&self, kind: ChunkKind, text: &str) -> ChatChunk;

    /// Formats tool descriptors for the provider's `tools` request field.
    fn format_tools(&self, tools: &[ToolDescriptor]) -> Vec<Value>;

    /// Feeds one raw provider chunk into `state`.
    ///
    /// Errors are [`toolbridge_core::ToolbridgeError::ProtocolViolation`]: the chunk
    /// did not fit the accumulation state and was skipped, leaving `state` unchanged.
    fn ingest(&self, state: &mut TurnState, chunk: &Value) -> ToolbridgeResult<()>;

    /// Assistant text carried by a raw provider chunk, if any.
    fn text_delta<'a>(&self, chunk: &'a Value) -> Option<&'a str>;

    /// The assistant message announcing `calls`, to be appended before their results.
    fn assistant_message(&self, text: &str, calls: &[FinalizedToolCall]) -> ChatMessage;

    /// The message carrying one tool's result back to the model.
    fn tool_result_message(&self, call_id: &str, text: &str, is_error: bool) -> ChatMessage;
}

/// Builds a synthetic chunk for `dialect`.
pub fn make_chunk(kind: ChunkKind, text: &str, dialect: Dialect) -> ChatChunk {
    dialect.codec().make_chunk(kind, text)
}
