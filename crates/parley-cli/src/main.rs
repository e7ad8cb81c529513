//! # Parley
//!
//! Terminal client for Parley chat rooms.
//!
//! ## Usage
//!
//! ```bash
//! # Connect with settings from parley.toml or defaults
//! parley
//!
//! # Pick a server and profile on the command line
//! parley --server ws://chat.example.com/ws --nickname Ann --avatar cat
//!
//! # Keep logs out of the UI
//! parley --log-file parley.log
//!
//! # Run with environment variables
//! PARLEY_SERVER=ws://127.0.0.1:8080/ws PARLEY_NICKNAME=Ann parley
//! ```

mod app;
mod config;
mod metrics;
mod runtime;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use parley_client::{ChatClient, WebSocketConfig, WebSocketTransport};
use parley_core::Avatar;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Parley terminal chat client
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Terminal client for Parley chat rooms")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to parley.toml, then ~/.config/parley/parley.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// WebSocket URL of the chat server
    #[arg(short, long)]
    server: Option<String>,

    /// Nickname to prefill in the lobby
    #[arg(short, long)]
    nickname: Option<String>,

    /// Avatar to preselect: glyph, name, or number 1-8
    #[arg(short, long)]
    avatar: Option<Avatar>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "parley=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .init();
        }
        None => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration, then apply command line overrides
    let mut config = config::Config::load(args.config.as_deref())?;
    if let Some(server) = args.server {
        config.server_url = server;
    }
    if let Some(nickname) = args.nickname {
        config.profile.nickname = Some(nickname);
    }
    if let Some(avatar) = args.avatar {
        config.profile.avatar = avatar;
    }
    if let Some(log_file) = args.log_file {
        config.log_file = Some(log_file);
    }

    init_tracing(config.log_file.as_deref())?;

    if config.metrics.enabled {
        metrics::start_metrics_server(config.metrics.port)?;
    }

    tracing::info!("Connecting to {}", config.server_url);
    let (transport, events) =
        WebSocketTransport::connect(WebSocketConfig::new(config.server_url.as_str()))
            .await
            .with_context(|| format!("Failed to connect to {}", config.server_url))?;

    let client = ChatClient::start(Arc::new(transport), events, config.session_config());
    let app = app::App::new(config.profile.nickname.clone(), config.profile.avatar);

    runtime::run(client, app).await
}
