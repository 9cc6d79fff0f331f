//! The bounded multi-turn chat loop.
//!
//! A run goes through setup (connect every backend, list and format tools) eagerly in
//! [`ChatOrchestrator::start`], then a producer task alternates model calls and tool
//! execution until the model answers without tools or the turn budget is spent. Every
//! provider chunk is forwarded unmodified; synthetic progress and error chunks are
//! interleaved in the run's dialect.

use crate::accumulator::FinalizedToolCall;
use crate::chunk::{ChatChunk, ChunkKind};
use crate::codec::{TurnState, WireCodec};
use crate::config::ChatConfig;
use crate::model::{ModelClient, ModelRequest};
use crate::stream::ChatStream;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use toolbridge_core::{ChatMessage, ToolOutcome, ToolbridgeError, ToolbridgeResult};
use toolbridge_mcp::SessionRegistry;
use tracing::{debug, error, info, warn};

const ANALYZING: &str = "Analyzing your question and determining next steps...";
const USING_TOOLS: &str = "Using MCP tools to gather information...";
const ALL_TOOLS_EXECUTED: &str = "All tools executed.";
const FORMULATING: &str = "Information gathered. Formulating complete response...";

/// Chunk channel depth between the producer task and the stream.
const CHANNEL_CAPACITY: usize = 64;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The model answered without requesting tools.
    Completed,
    /// The model still wanted tools when the turn budget ran out.
    TurnBudgetExhausted,
    /// A fatal error ended the run; the message is the one sent in the ERROR chunk.
    Failed(String),
    /// The consumer dropped the stream.
    Cancelled,
}

/// Final state of a run.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// Conversation after the run: input history plus everything appended.
    pub conversation: Vec<ChatMessage>,
    /// Number of model calls made.
    pub turns: u32,
    /// How the run ended.
    pub termination: Termination,
}

impl ChatOutcome {
    /// Bundles a finished run.
    pub fn new(conversation: Vec<ChatMessage>, turns: u32, termination: Termination) -> Self {
        Self {
            conversation,
            turns,
            termination,
        }
    }

    /// Text of the last assistant message, if it is plain text.
    pub fn final_text(&self) -> Option<&str> {
        self.conversation
            .iter()
            .rev()
            .find(|m| m.role == toolbridge_core::Role::Assistant)
            .and_then(ChatMessage::text)
    }
}

/// Drives one chat run against a model and a set of tool backends.
pub struct ChatOrchestrator {
    config: ChatConfig,
    model: Arc<dyn ModelClient>,
    registry: SessionRegistry,
    history: Vec<ChatMessage>,
}

impl ChatOrchestrator {
    /// A run over `history` with the given model and tool backends.
    pub fn new(
        config: ChatConfig,
        model: Arc<dyn ModelClient>,
        registry: SessionRegistry,
        history: Vec<ChatMessage>,
    ) -> Self {
        Self {
            config,
            model,
            registry,
            history,
        }
    }

    /// Runs setup and starts streaming.
    ///
    /// Setup failures (invalid config, a backend that cannot be reached, a failed tool
    /// listing) are returned here and no chunk is produced. Every session opened
    /// during setup is closed before the error is returned.
    pub async fn start(self) -> ToolbridgeResult<ChatStream> {
        let Self {
            config,
            model,
            mut registry,
            history,
        } = self;
        config.validate()?;

        registry.initialize().await?;
        let descriptors = match registry.list_tools().await {
            Ok((_, descriptors)) => descriptors,
            Err(e) => {
                error!(error = %e, "Failed to list tools");
                if let Err(close_err) = registry.close().await {
                    warn!(error = %close_err, "Failed to close sessions after setup error");
                }
                return Err(e);
            }
        };

        let codec = config.provider.codec();
        let tools = codec.format_tools(&descriptors);
        info!(
            provider = %config.provider,
            model = %config.model_id,
            sessions = registry.session_count(),
            tools = tools.len(),
            max_turns = config.max_turns,
            "Chat run starting"
        );

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let dialect = config.provider;
        let run = ChatRun {
            config,
            model,
            registry,
            codec,
            tools,
            conversation: history,
            turns: 0,
            tx,
        };
        let handle = tokio::spawn(run.run());
        Ok(ChatStream::new(rx, handle, dialect))
    }

    /// Runs to completion without streaming and returns the outcome.
    pub async fn collect(self) -> ToolbridgeResult<ChatOutcome> {
        let stream = self.start().await?;
        Ok(stream.finish().await)
    }
}

/// Producer side of a run, owned by the spawned task.
struct ChatRun {
    config: ChatConfig,
    model: Arc<dyn ModelClient>,
    registry: SessionRegistry,
    codec: &'static dyn WireCodec,
    tools: Vec<serde_json::Value>,
    conversation: Vec<ChatMessage>,
    turns: u32,
    tx: mpsc::Sender<ChatChunk>,
}

impl ChatRun {
    async fn run(mut self) -> ChatOutcome {
        let result = self.drive().await;

        if let Err(e) = self.registry.close().await {
            warn!(error = %e, "Failed to close tool sessions");
        }

        let termination = match result {
            Ok(termination) => match self.emit(ChunkKind::StreamEnd, "").await {
                Ok(()) => termination,
                Err(_) => Termination::Cancelled,
            },
            Err(ToolbridgeError::Cancelled) => Termination::Cancelled,
            Err(e) => {
                error!(turn = self.turns, error = %e, "Chat run failed");
                let message = format!("Error: {e}");
                let _ = self.emit(ChunkKind::Error, &message).await;
                Termination::Failed(message)
            }
        };

        match &termination {
            Termination::Cancelled => info!(turns = self.turns, "Chat run cancelled by consumer"),
            other => info!(turns = self.turns, termination = ?other, "Chat run finished"),
        }

        ChatOutcome::new(self.conversation, self.turns, termination)
    }

    async fn drive(&mut self) -> ToolbridgeResult<Termination> {
        self.emit(ChunkKind::StreamStart, "").await?;
        self.emit(ChunkKind::Progress, ANALYZING).await?;

        loop {
            self.turns += 1;
            let state = self.model_turn().await?;
            let text = state.text;
            let calls = state.accumulator.finalize();

            if calls.is_empty() {
                if !text.is_empty() {
                    self.conversation.push(ChatMessage::assistant(text));
                }
                return Ok(Termination::Completed);
            }

            if self.turns >= self.config.max_turns {
                warn!(
                    turns = self.turns,
                    pending = calls.len(),
                    "Turn budget exhausted with tool calls pending"
                );
                if !text.is_empty() {
                    self.conversation.push(ChatMessage::assistant(text));
                }
                let notice = format!(
                    "Reached the limit of {} model turns; {} requested tool call(s) were not executed.",
                    self.config.max_turns,
                    calls.len()
                );
                self.emit(ChunkKind::Progress, &notice).await?;
                return Ok(Termination::TurnBudgetExhausted);
            }

            self.emit(ChunkKind::Progress, USING_TOOLS).await?;
            let assistant = self.codec.assistant_message(&text, &calls);
            let results = self.execute_tools(&calls).await?;
            self.conversation.push(assistant);
            self.conversation.extend(results);
            self.emit(ChunkKind::Progress, FORMULATING).await?;
        }
    }

    /// One model call: forwards every chunk and feeds it to the codec.
    async fn model_turn(&mut self) -> ToolbridgeResult<TurnState> {
        let request = ModelRequest {
            model: self.config.model_id.clone(),
            messages: self.conversation.clone(),
            tools: self.tools.clone(),
            params: self.config.generation_params(),
        };
        debug!(
            turn = self.turns,
            messages = request.messages.len(),
            "Calling model"
        );

        let mut chunks = tokio::select! {
            started = self.model.stream(&request) => started?,
            _ = self.tx.closed() => return Err(ToolbridgeError::Cancelled),
        };

        let mut state = TurnState::new();
        loop {
            let next = tokio::select! {
                next = chunks.next() => next,
                _ = self.tx.closed() => return Err(ToolbridgeError::Cancelled),
            };
            let Some(item) = next else {
                break;
            };
            let raw = item?;

            let ingested = self.codec.ingest(&mut state, &raw);
            self.send(ChatChunk::Provider(raw)).await?;

            if let Err(e) = ingested {
                warn!(turn = self.turns, error = %e, "Provider chunk skipped");
                self.emit(ChunkKind::Error, &format!("Error processing response: {e}"))
                    .await?;
            }
        }

        debug!(
            turn = self.turns,
            tool_calls = state.accumulator.len(),
            text_len = state.text.len(),
            "Model turn complete"
        );
        Ok(state)
    }

    /// Runs `calls` sequentially, in order. Failures stay inside each tool's result.
    async fn execute_tools(
        &self,
        calls: &[FinalizedToolCall],
    ) -> ToolbridgeResult<Vec<ChatMessage>> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            self.emit(ChunkKind::Progress, &format!("Executing tool: {}...", call.name))
                .await?;

            let (text, is_error) = match &call.arguments {
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Tool call has malformed arguments");
                    (format!("Error: {e}"), true)
                }
                Ok(arguments) => {
                    let invoked = tokio::select! {
                        invoked = self.registry.invoke(&call.name, arguments.clone()) => invoked,
                        _ = self.tx.closed() => return Err(ToolbridgeError::Cancelled),
                    };
                    match invoked {
                        Ok(ToolOutcome::Completed(text)) => {
                            info!(tool = %call.name, "Tool executed");
                            (text, false)
                        }
                        Ok(ToolOutcome::NotFound) => {
                            let e = ToolbridgeError::ToolNotFound(call.name.clone());
                            (format!("Error: {e}"), true)
                        }
                        Err(e) => {
                            warn!(tool = %call.name, error = %e, "Tool execution failed");
                            (format!("Error: {e}"), true)
                        }
                    }
                }
            };

            results.push(self.codec.tool_result_message(&call.id, &text, is_error));
            self.emit(
                ChunkKind::Progress,
                &format!("Tool {} execution complete.", call.name),
            )
            .await?;
        }

        self.emit(ChunkKind::Progress, ALL_TOOLS_EXECUTED).await?;
        Ok(results)
    }

    async fn emit(&self, kind: ChunkKind, text: &str) -> ToolbridgeResult<()> {
        self.send(self.codec.make_chunk(kind, text)).await
    }

    async fn send(&self, chunk: ChatChunk) -> ToolbridgeResult<()> {
        self.tx
            .send(chunk)
            .await
            .map_err(|_| ToolbridgeError::Cancelled)
    }
}
