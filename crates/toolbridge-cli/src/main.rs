//! `toolbridge` command-line entry point.

mod config;

use clap::{Parser, Subcommand};
use config::ToolbridgeConfig;
use futures_util::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use toolbridge_chat::{model_client, ChatChunk, ChatOrchestrator, ChunkKind, Termination};
use toolbridge_core::ChatMessage;
use toolbridge_mcp::SessionRegistry;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "toolbridge", about = "Stream LLM chats over MCP tools")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "toolbridge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to every active server and list the routed tools
    Tools,
    /// Run one streaming chat
    Chat {
        /// The user message
        prompt: String,
        /// System message (overrides config)
        #[arg(long)]
        system: Option<String>,
        /// Model-call budget (overrides config)
        #[arg(long)]
        max_turns: Option<u32>,
        /// Print every chunk as a JSON line instead of rendered text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let mut config = ToolbridgeConfig::load(&cli.config).await?;
    let servers = config.active_servers();
    info!(
        config = %cli.config.display(),
        servers = servers.len(),
        skipped = config.servers.len() - servers.len(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Tools => {
            let mut registry = SessionRegistry::with_transports(servers);
            registry.initialize().await?;
            println!(
                "Connected to {} server(s): {}",
                registry.session_count(),
                registry.session_names().join(", ")
            );
            let listed = registry.list_tools().await;
            let closed = registry.close().await;
            let (routing, tools) = listed?;
            closed?;

            if tools.is_empty() {
                println!("No tools available.");
                println!("Configure servers in toolbridge.toml under [[servers]]");
            } else {
                println!("Routed tools:");
                for tool in &tools {
                    let owner = routing.owner(&tool.name).unwrap_or("?");
                    println!("  {} [{}]: {}", tool.name, owner, tool.description);
                }
            }
        }
        Commands::Chat {
            prompt,
            system,
            max_turns,
            json,
        } => {
            if let Some(system) = system {
                config.model.system_message = Some(system);
            }
            if let Some(max_turns) = max_turns {
                config.model.max_turns = max_turns;
            }
            config.resolve_api_key()?;

            let codec = config.model.provider.codec();
            let model = model_client(&config.model);
            let registry = SessionRegistry::with_transports(servers);
            let orchestrator = ChatOrchestrator::new(
                config.model,
                model,
                registry,
                vec![ChatMessage::user(prompt)],
            );

            let mut stream = orchestrator.start().await?;
            let mut stdout = std::io::stdout();
            while let Some(chunk) = stream.next().await {
                if json {
                    writeln!(stdout, "{}", chunk.to_wire())?;
                    continue;
                }
                match &chunk {
                    ChatChunk::Provider(raw) => {
                        if let Some(text) = codec.text_delta(raw) {
                            write!(stdout, "{text}")?;
                            stdout.flush()?;
                        }
                    }
                    _ => match chunk.event() {
                        Some((ChunkKind::Progress, text)) => eprintln!("[progress] {text}"),
                        Some((ChunkKind::Error, text)) => eprintln!("[error] {text}"),
                        _ => {}
                    },
                }
            }
            if !json {
                writeln!(stdout)?;
            }

            let outcome = stream.finish().await;
            info!(turns = outcome.turns, termination = ?outcome.termination, "Chat finished");
            if let Termination::Failed(message) = outcome.termination {
                anyhow::bail!(message);
            }
        }
    }

    Ok(())
}
