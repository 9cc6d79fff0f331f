use super::{send_streaming, sse_json_stream};
use crate::model::{ChunkStream, ModelClient, ModelRequest};
use async_trait::async_trait;
use toolbridge_core::ToolbridgeResult;
use tracing::debug;

/// OpenAI-compatible chat completions client.
///
/// Works with any provider that implements `/v1/chat/completions` streaming.
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiClient {
    /// A client for `{base_url}/v1/chat/completions`.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Request body. A system prompt, if any, becomes a leading `system` message.
    pub fn build_body(&self, request: &ModelRequest) -> serde_json::Value {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.params.system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        for m in &request.messages {
            messages.push(serde_json::json!(m));
        }

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "stream": true,
        });

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(request.tools);
        }
        if let Some(temperature) = request.params.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if let Some(max_tokens) = request.params.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(options) = &request.params.stream_options {
            body["stream_options"] = options.clone();
        }
        body
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn stream(&self, request: &ModelRequest) -> ToolbridgeResult<ChunkStream> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!(model = %request.model, messages = request.messages.len(), "OpenAI stream request");

        let http_request = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.build_body(request));

        let resp = send_streaming(http_request, "OpenAI").await?;
        Ok(sse_json_stream(resp, "OpenAI"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::GenerationParams;
    use serde_json::json;
    use toolbridge_core::ChatMessage;

    fn request(params: GenerationParams, tools: Vec<serde_json::Value>) -> ModelRequest {
        ModelRequest {
            model: "gpt-4o".into(),
            messages: vec![ChatMessage::user("hi")],
            tools,
            params,
        }
    }

    #[test]
    fn test_body_omits_unset_params() {
        let client = OpenAiClient::new("sk", "http://localhost");
        let body = client.build_body(&request(GenerationParams::default(), vec![]));
        assert_eq!(
            body,
            json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hi"}], "stream": true})
        );
    }

    #[test]
    fn test_body_carries_set_params() {
        let client = OpenAiClient::new("sk", "http://localhost");
        let params = GenerationParams {
            temperature: Some(0.5),
            max_tokens: Some(100),
            system: Some("Be terse.".into()),
            stream_options: Some(json!({"include_usage": true})),
        };
        let body = client.build_body(&request(params, vec![json!({"type": "function"})]));
        assert_eq!(body["messages"][0], json!({"role": "system", "content": "Be terse."}));
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["temperature"], json!(0.5));
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["tools"].as_array().unwrap().len(), 1);
    }
}
