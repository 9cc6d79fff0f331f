use serde_json::Value;
use std::collections::BTreeMap;
use toolbridge_core::{ToolbridgeError, ToolbridgeResult};

#[derive(Debug, Clone, Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// A tool call whose fragments have all arrived.
#[derive(Debug)]
pub struct FinalizedToolCall {
    /// Call id, as streamed or synthesized as `call_<n>`.
    pub id: String,
    /// Tool name; the first non-empty fragment wins.
    pub name: String,
    /// Concatenated argument text, exactly as streamed.
    pub raw_arguments: String,
    /// Parsed arguments, or [`ToolbridgeError::MalformedArguments`] for this call only.
    pub arguments: ToolbridgeResult<Value>,
}

impl FinalizedToolCall {
    /// Whether the arguments failed to parse.
    pub fn is_malformed(&self) -> bool {
        self.arguments.is_err()
    }
}

/// Rebuilds tool calls from streamed fragments.
///
/// OpenAI deltas address an entry by provider index ([`Self::apply_indexed_delta`]).
/// Anthropic opens blocks sequentially and streams argument text into whichever block
/// is current ([`Self::open_block`], [`Self::append_to_current`]). A name is set once
/// (first non-empty wins); argument text is append-only.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    entries: BTreeMap<u64, PendingToolCall>,
    next_block: u64,
    current: Option<u64>,
}

impl ToolCallAccumulator {
    /// An empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no tool call has been opened.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of tool calls opened so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn synthesized_id(&self) -> String {
        format!("call_{}", self.entries.len())
    }

    /// Applies one OpenAI `tool_calls[]` delta.
    pub fn apply_indexed_delta(
        &mut self,
        index: u64,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) {
        if let Some(entry) = self.entries.get_mut(&index) {
            if let Some(name) = name.filter(|n| !n.is_empty()) {
                if entry.name.is_empty() {
                    entry.name = name.to_string();
                }
            }
            if let Some(fragment) = arguments {
                entry.arguments.push_str(fragment);
            }
            return;
        }

        let id = match id.filter(|i| !i.is_empty()) {
            Some(id) => id.to_string(),
            None => self.synthesized_id(),
        };
        self.entries.insert(
            index,
            PendingToolCall {
                id,
                name: name.unwrap_or_default().to_string(),
                arguments: arguments.unwrap_or_default().to_string(),
            },
        );
    }

    /// Opens an Anthropic `tool_use` block at the next sequential index and makes it
    /// current. Returns that index.
    pub fn open_block(&mut self, id: &str, name: &str) -> u64 {
        let index = self.next_block;
        self.next_block += 1;
        let id = if id.is_empty() {
            self.synthesized_id()
        } else {
            id.to_string()
        };
        self.entries.insert(
            index,
            PendingToolCall {
                id,
                name: name.to_string(),
                arguments: String::new(),
            },
        );
        self.current = Some(index);
        index
    }

    /// Appends an `input_json_delta` fragment to the current block.
    pub fn append_to_current(&mut self, fragment: &str) -> ToolbridgeResult<()> {
        let entry = self
            .current
            .and_then(|idx| self.entries.get_mut(&idx))
            .ok_or_else(|| {
                ToolbridgeError::ProtocolViolation(
                    "input_json_delta received with no open tool_use block".into(),
                )
            })?;
        entry.arguments.push_str(fragment);
        Ok(())
    }

    /// Closes the current block; later fragments need a new block.
    pub fn close_current(&mut self) {
        self.current = None;
    }

    /// Consumes the accumulator, parsing each entry independently, in index order.
    ///
    /// Blank argument text parses as `{}`.
    pub fn finalize(self) -> Vec<FinalizedToolCall> {
        self.entries
            .into_values()
            .map(|pending| {
                let arguments = if pending.arguments.trim().is_empty() {
                    Ok(Value::Object(Default::default()))
                } else {
                    serde_json::from_str(&pending.arguments).map_err(|e| {
                        ToolbridgeError::MalformedArguments {
                            tool: pending.name.clone(),
                            message: e.to_string(),
                        }
                    })
                };
                FinalizedToolCall {
                    id: pending.id,
                    name: pending.name,
                    raw_arguments: pending.arguments,
                    arguments,
                }
            })
            .collect()
    }
}
