use super::{TurnState, WireCodec};
use crate::accumulator::FinalizedToolCall;
use crate::chunk::{AnthropicCompatibleChunk, ChatChunk, ChunkKind};
use crate::dialect::Dialect;
use serde_json::{json, Value};
use toolbridge_core::{ChatMessage, Role, ToolDescriptor, ToolbridgeError, ToolbridgeResult};

/// Anthropic messages dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnthropicCodec;

impl WireCodec for AnthropicCodec {
    fn dialect(&self) -> Dialect {
        Dialect::Anthropic
    }

    fn make_chunk(&self, kind: ChunkKind, text: &str) -> ChatChunk {
        ChatChunk::Anthropic(AnthropicCompatibleChunk::new(kind, text))
    }

    fn format_tools(&self, tools: &[ToolDescriptor]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.input_schema,
                })
            })
            .collect()
    }

    fn ingest(&self, state: &mut TurnState, chunk: &Value) -> ToolbridgeResult<()> {
        let Some(event) = chunk["type"].as_str() else {
            return Err(ToolbridgeError::ProtocolViolation(format!(
                "event without a type: {chunk}"
            )));
        };

        match event {
            "content_block_start" => {
                let block = &chunk["content_block"];
                match block["type"].as_str() {
                    Some("tool_use") => {
                        state.accumulator.open_block(
                            block["id"].as_str().unwrap_or_default(),
                            block["name"].as_str().unwrap_or_default(),
                        );
                    }
                    Some("text") => {
                        if let Some(text) = block["text"].as_str() {
                            state.text.push_str(text);
                        }
                    }
                    _ => {}
                }
            }
            "content_block_delta" => {
                let delta = &chunk["delta"];
                match delta["type"].as_str() {
                    Some("input_json_delta") => {
                        let fragment = delta["partial_json"].as_str().unwrap_or_default();
                        state.accumulator.append_to_current(fragment)?;
                    }
                    Some("text_delta") => {
                        if let Some(text) = delta["text"].as_str() {
                            state.text.push_str(text);
                        }
                    }
                    _ => {}
                }
            }
            "content_block_stop" => state.accumulator.close_current(),
            _ => {}
        }
        Ok(())
    }

    fn text_delta<'a>(&self, chunk: &'a Value) -> Option<&'a str> {
        if chunk["type"] != "content_block_delta" || chunk["delta"]["type"] != "text_delta" {
            return None;
        }
        chunk["delta"]["text"].as_str()
    }

    fn assistant_message(&self, text: &str, calls: &[FinalizedToolCall]) -> ChatMessage {
        let mut blocks = Vec::with_capacity(calls.len() + 1);
        if !text.is_empty() {
            blocks.push(json!({"type": "text", "text": text}));
        }
        for call in calls {
            let input = match &call.arguments {
                Ok(input) => input.clone(),
                Err(_) => json!({}),
            };
            blocks.push(json!({
                "type": "tool_use",
                "id": call.id,
                "name": call.name,
                "input": input,
            }));
        }

        ChatMessage {
            role: Role::Assistant,
            content: Value::Array(blocks),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    fn tool_result_message(&self, call_id: &str, text: &str, is_error: bool) -> ChatMessage {
        let mut block = json!({
            "type": "tool_result",
            "tool_use_id": call_id,
            "content": text,
        });
        if is_error {
            block["is_error"] = Value::Bool(true);
        }

        ChatMessage {
            role: Role::User,
            content: Value::Array(vec![block]),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}
