use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use pfm_chat::share::{self, DemoConfig, ShareError};
use pfm_chat::{ChatConfig, ChatDispatcher, ChatError, ChatStore, ChatView, ViewOptions, export};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Share(#[from] ShareError),
    #[error("io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("chat endpoint is unhealthy")]
    Unhealthy,
}

#[derive(Parser, Debug)]
#[command(name = "pfm-chat", about = "Chat with the PFM API assistant from a terminal")]
struct Cli {
    /// Overrides `CHAT_API_URL` and the built-in endpoint.
    #[arg(long, env = "CHAT_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one message and print the reply.
    Send {
        text: String,
        #[arg(long)]
        new_session: bool,
    },
    /// Interactive session. Lines starting with `/` are commands.
    Chat,
    /// Probe the endpoint's health route.
    Health,
    /// Print a demo share link.
    ShareLink {
        product_id: String,
        #[arg(long, default_value = "http://localhost:3000")]
        origin: String,
        /// Demo config as JSON; defaults apply to missing fields.
        #[arg(long)]
        config: Option<String>,
    },
    /// Decode a demo share link and print its config.
    DecodeLink { link: String },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut config = ChatConfig::from_env()?;
    if let Some(api_url) = cli.api_url {
        config.dispatch.api_url = api_url;
    }

    match cli.command {
        Command::Send { text, new_session } => run_send(&config, &text, new_session).await,
        Command::Chat => run_chat(&config).await,
        Command::Health => run_health(&config).await,
        Command::ShareLink { product_id, origin, config } => run_share_link(&origin, &product_id, config.as_deref()),
        Command::DecodeLink { link } => run_decode_link(&link),
    }
}

fn build_dispatcher(config: &ChatConfig) -> Result<ChatDispatcher, CliError> {
    let store = ChatStore::in_memory(config.store.clone());
    Ok(ChatDispatcher::http(store, config.dispatch.clone())?)
}

async fn run_send(config: &ChatConfig, text: &str, new_session: bool) -> Result<(), CliError> {
    let dispatcher = build_dispatcher(config)?;
    let outcome = dispatcher.send_message(text, new_session).await?;
    println!("{}", outcome.bot_message.text);
    Ok(())
}

async fn run_health(config: &ChatConfig) -> Result<(), CliError> {
    let dispatcher = build_dispatcher(config)?;
    if dispatcher.health_check().await {
        println!("ok");
        Ok(())
    } else {
        Err(CliError::Unhealthy)
    }
}

async fn run_chat(config: &ChatConfig) -> Result<(), CliError> {
    let dispatcher = build_dispatcher(config)?;
    let options = ViewOptions { error_banner_ttl: config.error_banner_ttl, ..ViewOptions::default() };
    let view = ChatView::attach("terminal", &dispatcher, options);
    for message in view.snapshot().message_history {
        println!("AI: {}", message.text);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(command) = line.strip_prefix('/') {
            let mut parts = command.split_whitespace();
            match (parts.next().unwrap_or_default(), parts.next()) {
                ("quit" | "exit", _) => break,
                ("new", _) => {
                    view.new_session();
                    eprintln!("started a new session");
                }
                ("clear", _) => view.clear(),
                ("end", _) => {
                    view.end_session();
                    eprintln!("session ended");
                }
                ("export", dir) => eprintln!("{}", export_status(&view, dir)),
                ("health", _) => {
                    let healthy = dispatcher.health_check().await;
                    eprintln!("{}", if healthy { "healthy" } else { "unhealthy" });
                }
                ("state", _) => {
                    let snapshot = view.snapshot();
                    eprintln!(
                        "session={} messages={} loading={} error={}",
                        snapshot.current_session.map_or_else(|| "none".to_string(), |s| s.session_id),
                        snapshot.message_history.len(),
                        snapshot.is_loading,
                        snapshot.error.unwrap_or_default()
                    );
                }
                (other, _) => eprintln!("unknown command: /{other}"),
            }
            continue;
        }

        match view.submit(line, false).await {
            Ok(outcome) => println!("AI: {}", outcome.bot_message.text),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    view.detach();
    Ok(())
}

/// Write the transcript and describe the outcome. Failures are reported,
/// never propagated, so the session survives a bad directory.
fn export_status(view: &ChatView, dir: Option<&str>) -> String {
    let dir = dir.map_or_else(|| PathBuf::from("."), PathBuf::from);
    match export::write_transcript(&view.export(), &dir) {
        Ok(path) => format!("transcript written to {}", path.display()),
        Err(e) => format!("export failed: {e}"),
    }
}

fn run_share_link(origin: &str, product_id: &str, raw: Option<&str>) -> Result<(), CliError> {
    let config: DemoConfig = match raw {
        Some(raw) => serde_json::from_str(raw)?,
        None => DemoConfig::default(),
    };
    println!("{}", share::share_link(origin, product_id, &config)?);
    Ok(())
}

fn run_decode_link(link: &str) -> Result<(), CliError> {
    let shared = share::decode_share_link(link)?;
    if let Some(product_id) = &shared.product_id {
        eprintln!("product: {product_id} (collapsed: {})", shared.collapsed);
    }
    let rendered = serde_json::to_string_pretty(&shared.config)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
