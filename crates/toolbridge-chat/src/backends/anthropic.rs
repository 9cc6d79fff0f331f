use super::{send_streaming, sse_json_stream};
use crate::model::{ChunkStream, ModelClient, ModelRequest};
use async_trait::async_trait;
use toolbridge_core::{Role, ToolbridgeResult};
use tracing::debug;

/// `max_tokens` is mandatory on the messages API.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages API client.
pub struct AnthropicClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl AnthropicClient {
    /// A client for `{base_url}/v1/messages`.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Request body. `system` messages in the conversation are lifted into the
    /// top-level `system` field, after the configured system prompt.
    pub fn build_body(&self, request: &ModelRequest) -> serde_json::Value {
        let mut system: Vec<String> = request.params.system.iter().cloned().collect();
        let mut messages = Vec::with_capacity(request.messages.len());
        for m in &request.messages {
            if m.role == Role::System {
                if let Some(text) = m.text() {
                    system.push(text.to_string());
                }
                continue;
            }
            messages.push(serde_json::json!(m));
        }

        let mut body = serde_json::json!({
            "model": request.model,
            "max_tokens": request.params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": messages,
            "stream": true,
        });

        if !system.is_empty() {
            body["system"] = serde_json::json!(system.join("\n\n"));
        }
        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(request.tools);
        }
        if let Some(temperature) = request.params.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        body
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn stream(&self, request: &ModelRequest) -> ToolbridgeResult<ChunkStream> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!(model = %request.model, messages = request.messages.len(), "Anthropic stream request");

        let http_request = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&self.build_body(request));

        let resp = send_streaming(http_request, "Anthropic").await?;
        Ok(sse_json_stream(resp, "Anthropic"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::GenerationParams;
    use serde_json::json;
    use toolbridge_core::ChatMessage;

    #[test]
    fn test_body_defaults_max_tokens_and_lifts_system() {
        let client = AnthropicClient::new("key", "http://localhost");
        let request = ModelRequest {
            model: "claude".into(),
            messages: vec![ChatMessage::system("House rules."), ChatMessage::user("hi")],
            tools: vec![],
            params: GenerationParams {
                system: Some("You are helpful.".into()),
                ..Default::default()
            },
        };
        let body = client.build_body(&request);
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(body["system"], "You are helpful.\n\nHouse rules.");
        assert_eq!(body["messages"], json!([{"role": "user", "content": "hi"}]));
        assert!(body.get("tools").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_body_ignores_stream_options() {
        let client = AnthropicClient::new("key", "http://localhost");
        let request = ModelRequest {
            model: "claude".into(),
            messages: vec![ChatMessage::user("hi")],
            tools: vec![json!({"name": "search"})],
            params: GenerationParams {
                max_tokens: Some(256),
                stream_options: Some(json!({"include_usage": true})),
                ..Default::default()
            },
        };
        let body = client.build_body(&request);
        assert_eq!(body["max_tokens"], 256);
        assert!(body.get("stream_options").is_none());
        assert_eq!(body["tools"][0]["name"], "search");
    }
}
