use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category of a synthetic chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// Plain payload data.
    Data,
    /// Human-readable progress narration.
    Progress,
    /// A failure. Terminal when it is the last chunk of a stream.
    Error,
    /// First chunk of every stream.
    StreamStart,
    /// Last chunk of a successful stream.
    StreamEnd,
}

impl ChunkKind {
    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkKind::Data => "data",
            ChunkKind::Progress => "progress",
            ChunkKind::Error => "error",
            ChunkKind::StreamStart => "stream_start",
            ChunkKind::StreamEnd => "stream_end",
        }
    }
}

/// `{ "type": kind, "content": text }`, the payload shared by both synthetic shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkContent {
    /// Serialized as `type`.
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    /// Free-text payload.
    pub content: String,
}

/// Delta of a synthetic OpenAI-shaped choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Synthetic content carried in place of provider text.
    pub content: ChunkContent,
}

/// Choice of a synthetic OpenAI-shaped chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Always 0.
    pub index: u32,
    /// The synthetic delta.
    pub delta: ChunkDelta,
    /// Always `None` for synthetic chunks.
    pub finish_reason: Option<String>,
}

/// Synthetic chunk that mimics an OpenAI `chat.completion.chunk` but carries a typed
/// content object in `delta.content` instead of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiCompatibleChunk {
    /// `custom-chatcmpl-<uuid>`.
    pub id: String,
    /// Always `chat.completion.chunk`.
    pub object: String,
    /// Unix timestamp in seconds.
    pub created: i64,
    /// Always `custom`.
    pub model: String,
    /// A single choice.
    pub choices: Vec<ChunkChoice>,
}

impl OpenAiCompatibleChunk {
    /// A chunk of `kind` carrying `text`.
    pub fn new(kind: ChunkKind, text: impl Into<String>) -> Self {
        Self {
            id: format!("custom-chatcmpl-{}", uuid::Uuid::new_v4()),
            object: "chat.completion.chunk".into(),
            created: chrono::Utc::now().timestamp(),
            model: "custom".into(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    content: ChunkContent {
                        kind,
                        content: text.into(),
                    },
                },
                finish_reason: None,
            }],
        }
    }

    fn content(&self) -> Option<&ChunkContent> {
        self.choices.first().map(|c| &c.delta.content)
    }
}

/// Synthetic chunk in Anthropic's `{ type, payload }` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicCompatibleChunk {
    /// Serialized as `type`.
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    /// Raw JSON, or `{type, content}` for text.
    pub payload: Value,
}

impl AnthropicCompatibleChunk {
    /// A chunk of `kind` carrying `text`.
    pub fn new(kind: ChunkKind, text: impl Into<String>) -> Self {
        Self::with_payload(kind, Value::String(text.into()))
    }

    /// An object payload is carried as is; anything else is wrapped as
    /// `{ "type": kind, "content": payload }`.
    pub fn with_payload(kind: ChunkKind, payload: Value) -> Self {
        let payload = if payload.is_object() {
            payload
        } else {
            serde_json::json!({ "type": kind, "content": payload })
        };
        Self { kind, payload }
    }
}

/// One item of a chat stream: either a provider chunk forwarded untouched, or a chunk
/// synthesized by the orchestrator in the run's dialect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChatChunk {
    /// Raw provider chunk.
    Provider(Value),
    /// Synthetic chunk, OpenAI shape.
    OpenAi(OpenAiCompatibleChunk),
    /// Synthetic chunk, Anthropic shape.
    Anthropic(AnthropicCompatibleChunk),
}

impl ChatChunk {
    /// The chunk as wire JSON.
    pub fn to_wire(&self) -> Value {
        match self {
            ChatChunk::Provider(raw) => raw.clone(),
            ChatChunk::OpenAi(chunk) => serde_json::json!(chunk),
            ChatChunk::Anthropic(chunk) => serde_json::json!(chunk),
        }
    }

    /// Kind and text of a synthetic chunk. `None` for provider chunks.
    pub fn event(&self) -> Option<(ChunkKind, &str)> {
        match self {
            ChatChunk::Provider(_) => None,
            ChatChunk::OpenAi(chunk) => chunk.content().map(|c| (c.kind, c.content.as_str())),
            ChatChunk::Anthropic(chunk) => Some((
                chunk.kind,
                chunk.payload["content"].as_str().unwrap_or_default(),
            )),
        }
    }

    /// Kind of a synthetic chunk; `None` for provider chunks.
    pub fn kind(&self) -> Option<ChunkKind> {
        self.event().map(|(kind, _)| kind)
    }

    /// The raw provider chunk, if this is one.
    pub fn provider(&self) -> Option<&Value> {
        match self {
            ChatChunk::Provider(raw) => Some(raw),
            _ => None,
        }
    }

    /// Whether this is a synthetic ERROR chunk.
    pub fn is_error(&self) -> bool {
        self.kind() == Some(ChunkKind::Error)
    }
}
