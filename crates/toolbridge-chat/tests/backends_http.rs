#![allow(clippy::unwrap_used, clippy::expect_used)]

//! HTTP model backends against a mock server.

use futures_util::StreamExt;
use serde_json::{json, Value};
use toolbridge_chat::{
    model_client, AnthropicClient, ChatConfig, ChatOrchestrator, ChunkKind, Dialect,
    GenerationParams, ModelClient, ModelRequest, OpenAiClient, Termination,
};
use toolbridge_core::{ChatMessage, ToolbridgeError, ToolbridgeResult};
use toolbridge_mcp::SessionRegistry;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(model: &str) -> ModelRequest {
    ModelRequest {
        model: model.into(),
        messages: vec![ChatMessage::user("hi")],
        tools: vec![],
        params: GenerationParams::default(),
    }
}

fn sse(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

async fn drain(client: &dyn ModelClient, req: &ModelRequest) -> Vec<ToolbridgeResult<Value>> {
    client.stream(req).await.unwrap().collect().await
}

#[tokio::test]
async fn test_openai_streams_parsed_chunks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-4o", "stream": true})))
        .respond_with(sse(concat!(
            ": keep-alive\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            "data: not json\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\" there\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"after done\"}}]}\n\n",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiClient::new("sk-test", server.uri());
    let items = drain(&client, &request("gpt-4o")).await;

    let texts: Vec<&str> = items
        .iter()
        .map(|item| item.as_ref().unwrap()["choices"][0]["delta"]["content"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["Hi", " there"]);
}

#[tokio::test]
async fn test_openai_error_status_fails_the_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("{\"error\":\"bad key\"}"))
        .mount(&server)
        .await;

    let client = OpenAiClient::new("wrong", server.uri());
    let err = client.stream(&request("gpt-4o")).await.err().unwrap();
    match err {
        ToolbridgeError::Model(msg) => {
            assert!(msg.contains("401"));
            assert!(msg.contains("bad key"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_anthropic_streams_events_and_sends_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "ak-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({"max_tokens": 4096, "stream": true})))
        .respond_with(sse(concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        )))
        .mount(&server)
        .await;

    let client = AnthropicClient::new("ak-test", server.uri());
    let items = drain(&client, &request("claude")).await;
    let types: Vec<String> = items
        .into_iter()
        .map(|item| item.unwrap()["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(types, vec!["message_start", "content_block_delta", "message_stop"]);
}

#[tokio::test]
async fn test_anthropic_error_event_ends_stream_with_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(sse(concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{}}\n\n",
            "event: error\n",
            "data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n",
        )))
        .mount(&server)
        .await;

    let client = AnthropicClient::new("ak", server.uri());
    let items = drain(&client, &request("claude")).await;
    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    match &items[1] {
        Err(ToolbridgeError::Model(msg)) => assert!(msg.contains("Overloaded")),
        other => panic!("expected model error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_orchestrated_run_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(sse(concat!(
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = ChatConfig::new(Dialect::OpenAi, "gpt-4o");
    config.api_key = "sk".into();
    config.api_base_url = Some(server.uri());
    let model = model_client(&config);

    let mut stream = ChatOrchestrator::new(
        config,
        model,
        SessionRegistry::with_transports(vec![]),
        vec![ChatMessage::user("Say hello")],
    )
    .start()
    .await
    .unwrap();

    let mut kinds = Vec::new();
    while let Some(chunk) = stream.next().await {
        kinds.push(chunk.kind());
    }
    assert_eq!(kinds.first(), Some(&Some(ChunkKind::StreamStart)));
    assert_eq!(kinds.last(), Some(&Some(ChunkKind::StreamEnd)));
    assert_eq!(kinds.iter().filter(|k| k.is_none()).count(), 3);

    let outcome = stream.finish().await;
    assert_eq!(outcome.termination, Termination::Completed);
    assert_eq!(outcome.final_text(), Some("Hello"));
}
