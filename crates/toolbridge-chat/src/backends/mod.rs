/// Anthropic Messages API client.
pub mod anthropic;
/// OpenAI chat-completions client.
pub mod openai;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;

use crate::config::ChatConfig;
use crate::dialect::Dialect;
use crate::model::{ChunkStream, ModelClient};
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use toolbridge_core::{ToolbridgeError, ToolbridgeResult};
use toolbridge_mcp::SseDecoder;
use tracing::{debug, warn};

/// Builds the HTTP model client for `config.provider`.
pub fn model_client(config: &ChatConfig) -> Arc<dyn ModelClient> {
    match config.provider {
        Dialect::OpenAi => Arc::new(OpenAiClient::new(&config.api_key, config.base_url())),
        Dialect::Anthropic => Arc::new(AnthropicClient::new(&config.api_key, config.base_url())),
    }
}

/// Sends the request and fails on a non-success status with the response body.
async fn send_streaming(
    request: reqwest::RequestBuilder,
    provider: &str,
) -> ToolbridgeResult<reqwest::Response> {
    let resp = request
        .send()
        .await
        .map_err(|e| ToolbridgeError::Http(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let error_body = resp
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        return Err(ToolbridgeError::Model(format!(
            "{provider} API error {status}: {error_body}"
        )));
    }
    Ok(resp)
}

/// Turns an SSE response body into a stream of parsed `data:` payloads.
///
/// `[DONE]` ends the stream. Payloads that are not JSON are skipped. An Anthropic
/// `error` event becomes a terminal `Err`. The reader stops as soon as the consumer
/// drops the stream, which also drops the HTTP connection.
fn sse_json_stream(resp: reqwest::Response, provider: &'static str) -> ChunkStream {
    let (tx, rx) = mpsc::channel::<ToolbridgeResult<serde_json::Value>>(256);
    let mut byte_stream = resp.bytes_stream();

    tokio::spawn(async move {
        let mut decoder = SseDecoder::new();
        while let Some(chunk_result) = byte_stream.next().await {
            let bytes = match chunk_result {
                Ok(bytes) => bytes,
                Err(e) => {
                    let _ = tx
                        .send(Err(ToolbridgeError::Model(format!(
                            "{provider} stream read error: {e}"
                        ))))
                        .await;
                    return;
                }
            };

            for event in decoder.push(&bytes) {
                if !forward_event(&tx, event.data, provider).await {
                    return;
                }
            }
        }
        if let Some(event) = decoder.finish() {
            forward_event(&tx, event.data, provider).await;
        }
        debug!(provider, "Model stream finished");
    });

    Box::pin(ReceiverStream::new(rx))
}

/// Returns `false` when the stream should stop.
async fn forward_event(
    tx: &mpsc::Sender<ToolbridgeResult<serde_json::Value>>,
    data: String,
    provider: &str,
) -> bool {
    let data = data.trim();
    if data.is_empty() {
        return true;
    }
    if data == "[DONE]" {
        return false;
    }

    let value: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            warn!(provider, error = %e, "Skipping non-JSON stream payload");
            return true;
        }
    };

    if value["type"] == "error" {
        let message = value["error"]["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| value["error"].to_string());
        let _ = tx
            .send(Err(ToolbridgeError::Model(format!(
                "{provider} stream error: {message}"
            ))))
            .await;
        return false;
    }

    tx.send(Ok(value)).await.is_ok()
}
