//! MCP over server-sent events.
//!
//! The client opens a long-lived `GET` on the server's SSE URL. The first `endpoint`
//! event names the URL to `POST` JSON-RPC messages to; responses come back as
//! `message` events on the stream.

use crate::rpc::{dispatch_message, fail_pending, pending_requests, McpConnection, RpcTransport};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use toolbridge_core::{ToolbridgeError, ToolbridgeResult};
use tracing::{debug, warn};

/// How long to wait for the server's `endpoint` event.
pub const ENDPOINT_TIMEOUT: Duration = Duration::from_secs(10);

/// One decoded server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` field, if any.
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

/// Incremental SSE decoder.
///
/// Bytes may be split anywhere, including inside a multi-byte character; only complete
/// lines are decoded. Comments and unknown fields are ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    /// An empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes, returning every event completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            if let Some(event) = self.feed_line(line.trim_end_matches(['\n', '\r'])) {
                out.push(event);
            }
        }
        out
    }

    /// Flushes a trailing event that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&raw).into_owned();
            if let Some(event) = self.feed_line(line.trim_end_matches('\r')) {
                return Some(event);
            }
        }
        self.flush()
    }

    fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.flush();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn flush(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() && self.event.is_none() {
            return None;
        }
        Some(SseEvent {
            event: self.event.take(),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

/// Resolves the `endpoint` event payload against the SSE URL.
pub fn resolve_endpoint(sse_url: &str, endpoint: &str) -> ToolbridgeResult<reqwest::Url> {
    let base = reqwest::Url::parse(sse_url)
        .map_err(|e| ToolbridgeError::Config(format!("Invalid SSE URL '{sse_url}': {e}")))?;
    base.join(endpoint.trim()).map_err(|e| {
        ToolbridgeError::Connection(format!("Invalid endpoint '{endpoint}' from '{sse_url}': {e}"))
    })
}

/// Outbound half of an SSE session: HTTP `POST`s to the announced endpoint.
pub struct SseTransport {
    http: reqwest::Client,
    endpoint: reqwest::Url,
    reader: StdMutex<Option<JoinHandle<()>>>,
}

impl SseTransport {
    fn stop_reader(&self) {
        if let Ok(mut reader) = self.reader.lock() {
            if let Some(handle) = reader.take() {
                handle.abort();
            }
        }
    }
}

#[async_trait]
impl RpcTransport for SseTransport {
    async fn send(&self, message: String) -> ToolbridgeResult<()> {
        let resp = self
            .http
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .body(message)
            .send()
            .await
            .map_err(|e| ToolbridgeError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ToolbridgeError::Session(format!(
                "MCP endpoint {} rejected message: {} {}",
                self.endpoint, status, body
            )));
        }
        Ok(())
    }

    async fn close(&self) -> ToolbridgeResult<()> {
        self.stop_reader();
        Ok(())
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

/// Open the event stream, wait for the endpoint announcement, and perform the
/// initialization handshake.
pub async fn connect_sse(
    server_name: &str,
    sse_url: &str,
) -> ToolbridgeResult<McpConnection<SseTransport>> {
    let http = reqwest::Client::new();
    let resp = http
        .get(sse_url)
        .header("Accept", "text/event-stream")
        .send()
        .await
        .map_err(|e| ToolbridgeError::Connection(format!("Failed to reach '{sse_url}': {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(ToolbridgeError::Connection(format!(
            "SSE endpoint '{sse_url}' answered {status}"
        )));
    }

    let pending = pending_requests();
    let (endpoint_tx, endpoint_rx) = oneshot::channel::<String>();

    let reader_pending = pending.clone();
    let reader_server = server_name.to_string();
    let mut byte_stream = resp.bytes_stream();
    let reader = tokio::spawn(async move {
        let mut decoder = SseDecoder::new();
        let mut endpoint_tx = Some(endpoint_tx);
        while let Some(chunk) = byte_stream.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(server = %reader_server, error = %e, "SSE stream read error");
                    break;
                }
            };
            for event in decoder.push(&bytes) {
                match event.event.as_deref() {
                    Some("endpoint") => {
                        if let Some(tx) = endpoint_tx.take() {
                            let _ = tx.send(event.data);
                        }
                    }
                    Some("message") | None => {
                        dispatch_message(&reader_pending, &event.data, &reader_server).await;
                    }
                    Some(other) => {
                        debug!(server = %reader_server, event = %other, "Ignoring SSE event");
                    }
                }
            }
        }
        debug!(server = %reader_server, "SSE stream closed");
        fail_pending(&reader_pending).await;
    });

    let endpoint = match tokio::time::timeout(ENDPOINT_TIMEOUT, endpoint_rx).await {
        Ok(Ok(endpoint)) => endpoint,
        Ok(Err(_)) => {
            reader.abort();
            return Err(ToolbridgeError::Connection(format!(
                "SSE stream '{sse_url}' closed before announcing an endpoint"
            )));
        }
        Err(_) => {
            reader.abort();
            return Err(ToolbridgeError::Connection(format!(
                "SSE stream '{sse_url}' did not announce an endpoint in time"
            )));
        }
    };

    let endpoint = match resolve_endpoint(sse_url, &endpoint) {
        Ok(url) => url,
        Err(e) => {
            reader.abort();
            return Err(e);
        }
    };
    debug!(server = %server_name, endpoint = %endpoint, "SSE endpoint announced");

    let transport = SseTransport {
        http,
        endpoint,
        reader: StdMutex::new(Some(reader)),
    };
    let connection = McpConnection::new(server_name, transport, pending);

    if let Err(e) = connection.handshake().await {
        let _ = connection.shutdown().await;
        return Err(ToolbridgeError::Connection(format!(
            "MCP handshake with '{server_name}' failed: {e}"
        )));
    }

    Ok(connection)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_named_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: endpoint\ndata: /messages?session_id=abc\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: Some("endpoint".into()),
                data: "/messages?session_id=abc".into(),
            }]
        );
    }

    #[test]
    fn test_joins_multiline_data() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: a\ndata: b\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "a\nb");
        assert!(events[0].event.is_none());
    }

    #[test]
    fn test_split_across_pushes_and_crlf() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"jsonrpc\":").is_empty());
        assert!(decoder.push(b"\"2.0\"}\r\n").is_empty());
        let events = decoder.push(b"\r\n");
        assert_eq!(events[0].data, "{\"jsonrpc\":\"2.0\"}");
    }

    #[test]
    fn test_split_inside_multibyte_char() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: café\n\n".as_bytes();
        let (head, tail) = bytes.split_at(10);
        assert!(decoder.push(head).is_empty());
        let events = decoder.push(tail);
        assert_eq!(events[0].data, "café");
    }

    #[test]
    fn test_comments_ignored_and_finish_flushes() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b": keep-alive\n\n").is_empty());
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish().unwrap().data, "tail");
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_resolve_relative_endpoint() {
        let url = resolve_endpoint("https://example.com/mcp/sse", "/messages?session_id=1").unwrap();
        assert_eq!(url.as_str(), "https://example.com/messages?session_id=1");

        let url = resolve_endpoint("https://example.com/mcp/sse", "messages").unwrap();
        assert_eq!(url.as_str(), "https://example.com/mcp/messages");
    }

    #[test]
    fn test_resolve_rejects_bad_base() {
        let err = resolve_endpoint("not a url", "/messages").unwrap_err();
        assert!(matches!(err, ToolbridgeError::Config(_)));
    }

    #[tokio::test]
    async fn test_connect_unreachable() {
        let err = connect_sse("down", "http://127.0.0.1:9/sse").await.err().unwrap();
        assert!(matches!(err, ToolbridgeError::Connection(_)));
    }
}
