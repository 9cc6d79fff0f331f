use crate::codec::{AnthropicCodec, OpenAiCodec, WireCodec};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use toolbridge_core::ToolbridgeError;

/// Provider wire format of a chat run.
///
/// The dialect is fixed when a run is configured; every chunk, tool list and
/// conversation message of that run goes through the matching [`WireCodec`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// OpenAI chat-completions chunks (`choices[].delta`).
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// Anthropic messages events (`content_block_*`).
    Anthropic,
}

impl Dialect {
    /// The codec implementing this dialect.
    pub fn codec(self) -> &'static dyn WireCodec {
        match self {
            Dialect::OpenAi => &OpenAiCodec,
            Dialect::Anthropic => &AnthropicCodec,
        }
    }

    /// Provider name as used in configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::OpenAi => "openai",
            Dialect::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = ToolbridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Dialect::OpenAi),
            "anthropic" => Ok(Dialect::Anthropic),
            other => Err(ToolbridgeError::Config(format!(
                "Unsupported provider: {other}"
            ))),
        }
    }
}
