use serde::{Deserialize, Serialize};

/// A tool as listed by a remote session's `tools/list`.
///
/// Descriptors are never mutated after listing; provider-specific projections (such as
/// a normalized schema) are built from clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique within its session.
    pub name: String,
    /// Human-readable description forwarded to the model.
    #[serde(default)]
    pub description: String,
    /// JSON schema of the tool's arguments.
    #[serde(default = "default_input_schema", rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

fn default_input_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl ToolDescriptor {
    /// Creates a descriptor.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Outcome of routing a tool invocation.
///
/// A routing miss is a value, not an error, so the caller can turn it into a visible
/// tool-result message and keep the conversation going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// The owning session ran the tool and returned this text.
    Completed(String),
    /// No session owns a tool with this name.
    NotFound,
}
