use super::{TurnState, WireCodec};
use crate::accumulator::FinalizedToolCall;
use crate::chunk::{ChatChunk, ChunkKind, OpenAiCompatibleChunk};
use crate::dialect::Dialect;
use crate::schema::normalize_schema;
use serde_json::{json, Value};
use toolbridge_core::{ChatMessage, Role, ToolDescriptor, ToolbridgeError, ToolbridgeResult};

/// OpenAI chat-completions dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAiCodec;

impl WireCodec for OpenAiCodec {
    fn dialect(&self) -> Dialect {
        Dialect::OpenAi
    }

    fn make_chunk(&self, kind: ChunkKind, text: &str) -> ChatChunk {
        ChatChunk::OpenAi(OpenAiCompatibleChunk::new(kind, text))
    }

    fn format_tools(&self, tools: &[ToolDescriptor]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "strict": true,
                        "parameters": normalize_schema(&t.input_schema),
                    }
                })
            })
            .collect()
    }

    fn ingest(&self, state: &mut TurnState, chunk: &Value) -> ToolbridgeResult<()> {
        if !chunk.is_object() {
            return Err(ToolbridgeError::ProtocolViolation(format!(
                "expected a chunk object, got {chunk}"
            )));
        }
        // Usage-only chunks carry an empty `choices`.
        let Some(choice) = chunk["choices"].get(0) else {
            return Ok(());
        };
        let delta = &choice["delta"];

        // Validate every entry before touching `state`.
        let mut updates = Vec::new();
        if let Some(calls) = delta["tool_calls"].as_array() {
            for call in calls {
                let index = call["index"].as_u64().ok_or_else(|| {
                    ToolbridgeError::ProtocolViolation(format!(
                        "tool_calls delta without an index: {call}"
                    ))
                })?;
                updates.push((index, call));
            }
        }

        if let Some(text) = delta["content"].as_str() {
            state.text.push_str(text);
        }
        for (index, call) in updates {
            state.accumulator.apply_indexed_delta(
                index,
                call["id"].as_str(),
                call["function"]["name"].as_str(),
                call["function"]["arguments"].as_str(),
            );
        }
        Ok(())
    }

    fn text_delta<'a>(&self, chunk: &'a Value) -> Option<&'a str> {
        chunk["choices"][0]["delta"]["content"].as_str()
    }

    fn assistant_message(&self, _text: &str, calls: &[FinalizedToolCall]) -> ChatMessage {
        let tool_calls = calls
            .iter()
            .map(|call| {
                let arguments = if call.is_malformed() || call.raw_arguments.trim().is_empty() {
                    "{}"
                } else {
                    call.raw_arguments.as_str()
                };
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {"name": call.name, "arguments": arguments},
                })
            })
            .collect();

        ChatMessage {
            role: Role::Assistant,
            content: Value::Null,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    fn tool_result_message(&self, call_id: &str, text: &str, _is_error: bool) -> ChatMessage {
        ChatMessage {
            role: Role::Tool,
            content: Value::String(text.to_string()),
            tool_calls: None,
            tool_call_id: Some(call_id.to_string()),
        }
    }
}
