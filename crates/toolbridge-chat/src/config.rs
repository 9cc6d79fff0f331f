use crate::dialect::Dialect;
use crate::model::GenerationParams;
use serde::{Deserialize, Serialize};
use toolbridge_core::{ToolbridgeError, ToolbridgeResult};

/// Settings of a chat run: which model to call and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Wire dialect, and with it the HTTP backend.
    pub provider: Dialect,
    /// Model name sent to the provider.
    pub model_id: String,
    /// Provider API key; may be filled from the environment.
    #[serde(default)]
    pub api_key: String,
    /// Overrides the provider's default base URL.
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Sampling temperature, sent only when set.
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Output token cap, sent only when set.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Upper bound on model calls per run.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// System prompt, sent only when set.
    #[serde(default)]
    pub system_message: Option<String>,
    /// OpenAI `stream_options`, passed through verbatim.
    #[serde(default)]
    pub stream_options: Option<serde_json::Value>,
}

fn default_max_turns() -> u32 {
    3
}

impl ChatConfig {
    /// Defaults for `provider` and `model_id`.
    pub fn new(provider: Dialect, model_id: impl Into<String>) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            api_key: String::new(),
            api_base_url: None,
            temperature: None,
            max_tokens: None,
            max_turns: default_max_turns(),
            system_message: None,
            stream_options: None,
        }
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url.trim_end_matches('/')
        } else {
            match self.provider {
                Dialect::OpenAi => "https://api.openai.com",
                Dialect::Anthropic => "https://api.anthropic.com",
            }
        }
    }

    /// Environment variable consulted when `api_key` is left empty.
    pub fn api_key_env(&self) -> &'static str {
        match self.provider {
            Dialect::OpenAi => "OPENAI_API_KEY",
            Dialect::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Rejects an empty model id and a zero turn budget.
    pub fn validate(&self) -> ToolbridgeResult<()> {
        if self.model_id.trim().is_empty() {
            return Err(ToolbridgeError::Config("model_id must not be empty".into()));
        }
        if self.max_turns == 0 {
            return Err(ToolbridgeError::Config("max_turns must be at least 1".into()));
        }
        Ok(())
    }

    /// Optional parameters for each model call.
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            system: self.system_message.clone(),
            stream_options: self.stream_options.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_toml() {
        let config: ChatConfig = toml::from_str(
            r#"
            provider = "anthropic"
            model_id = "claude-sonnet-4-20250514"
            "#,
        )
        .unwrap();
        assert_eq!(config.provider, Dialect::Anthropic);
        assert_eq!(config.max_turns, 3);
        assert!(config.temperature.is_none());
        assert!(config.api_key.is_empty());
        assert_eq!(config.base_url(), "https://api.anthropic.com");
        assert_eq!(config.api_key_env(), "ANTHROPIC_API_KEY");
    }

    #[test]
    fn test_stream_options_from_toml() {
        let config: ChatConfig = toml::from_str(
            r#"
            provider = "openai"
            model_id = "gpt-4o"
            api_base_url = "http://localhost:8080/"
            stream_options = { include_usage = true }
            "#,
        )
        .unwrap();
        assert_eq!(config.base_url(), "http://localhost:8080");
        assert_eq!(config.stream_options, Some(serde_json::json!({"include_usage": true})));
    }

    #[test]
    fn test_validate() {
        let mut config = ChatConfig::new(Dialect::OpenAi, "gpt-4o");
        assert!(config.validate().is_ok());

        config.max_turns = 0;
        assert!(matches!(config.validate(), Err(ToolbridgeError::Config(_))));

        let config = ChatConfig::new(Dialect::OpenAi, " ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_generation_params_only_carry_what_is_set() {
        let mut config = ChatConfig::new(Dialect::Anthropic, "claude");
        assert_eq!(config.generation_params(), GenerationParams::default());

        config.max_tokens = Some(512);
        config.system_message = Some("Be brief.".into());
        let params = config.generation_params();
        assert_eq!(params.max_tokens, Some(512));
        assert_eq!(params.system.as_deref(), Some("Be brief."));
        assert!(params.temperature.is_none());
    }
}
