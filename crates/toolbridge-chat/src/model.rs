use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;
use toolbridge_core::{ChatMessage, ToolbridgeResult};

/// Raw provider chunks of one model call, in arrival order.
///
/// An `Err` item ends the call; the orchestrator treats it as fatal.
pub type ChunkStream = Pin<Box<dyn Stream<Item = ToolbridgeResult<serde_json::Value>> + Send>>;

/// Optional generation parameters. Only the ones that are set reach the provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationParams {
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Output token cap.
    pub max_tokens: Option<u32>,
    /// System prompt.
    pub system: Option<String>,
    /// OpenAI `stream_options`, e.g. `{"include_usage": true}`.
    pub stream_options: Option<serde_json::Value>,
}

/// One streaming model call.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Model name.
    pub model: String,
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Tools already formatted for the provider. Empty means none are offered.
    pub tools: Vec<serde_json::Value>,
    /// Optional generation parameters.
    pub params: GenerationParams,
}

/// Capability to call a language model and stream back its raw chunks.
///
/// Implementations exist for OpenAI-compatible and Anthropic HTTP APIs in
/// [`crate::backends`]; tests script their own.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Starts a streaming completion.
    async fn stream(&self, request: &ModelRequest) -> ToolbridgeResult<ChunkStream>;
}
