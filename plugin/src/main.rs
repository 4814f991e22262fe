//! Music Time plugin sidecar.
//!
//! Runs next to the editor, reads editor events as newline-delimited JSON on
//! stdin and reports keystroke and song sessions to the Music Time backend.
//!
//! # Commands
//!
//! - `musictime-plugin run`: Start the sidecar
//! - `musictime-plugin replay`: Deliver the offline queues once and exit
//!
//! # Stdin protocol
//!
//! One JSON object per line. Editor events carry a `type` tag:
//!
//! ```text
//! {"type":"open","uri":"file:///repo/main.ts","project":{"directory":"/repo"},"lineCount":10,"length":200}
//! {"type":"change","uri":"file:///repo/main.ts","project":{"directory":"/repo"},"change":{"inserted":"a","lineCount":10,"length":201}}
//! {"type":"close","uri":"file:///repo/main.ts","project":{"directory":"/repo"}}
//! ```
//!
//! Player controls carry a `command` tag: `{"command":"pause"}`.
//!
//! # Environment Variables
//!
//! See the [`config`] module for available configuration options.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use musictime_plugin::clients::spotify::SPOTIFY_API_URL;
use musictime_plugin::clients::{
    GitRepoInfo, HttpBackendClient, NoopPlayer, PlayerClient, SpotifyWebPlayer,
};
use musictime_plugin::config::Config;
use musictime_plugin::events::EditorEvent;
use musictime_plugin::utils::SystemClock;
use musictime_plugin::{Collaborators, Engine};

/// Capacity of the stdin event channel.
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Music Time plugin sidecar.
///
/// Tracks keystrokes and the currently playing song and reports both to the
/// Music Time backend.
#[derive(Parser, Debug)]
#[command(name = "musictime-plugin")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    MUSICTIME_API_URL               Backend URL (default: https://api.software.com)
    MUSICTIME_JWT                   Backend token
    MUSICTIME_DATA_DIR              Offline queue directory (default: ~/.software)
    MUSICTIME_FLUSH_INTERVAL_SECS   Keystroke flush cadence (default: 60)
    MUSICTIME_POLL_INTERVAL_SECS    Player poll cadence (default: 5)
    MUSICTIME_NEAR_END_PERCENT      Near-end window percent (default: 6)
    MUSICTIME_SPOTIFY_ACCESS_TOKEN  Spotify Web API token
    MUSICTIME_PLUGIN_ID             Plugin id (default: 13)
    MUSICTIME_EXCLUDE_PATTERNS      Comma-separated path fragments to ignore

EXAMPLES:
    # Start the sidecar, reading editor events from stdin
    musictime-plugin run

    # Deliver queued offline data
    musictime-plugin replay
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Start the sidecar.
    ///
    /// Reads editor events from stdin until EOF or a shutdown signal.
    Run,

    /// Deliver the offline queues once and exit.
    Replay,
}

/// Player control sent by the editor.
#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum PlayerCommand {
    Play,
    Pause,
    Next,
    Previous,
}

#[derive(Debug)]
enum Inbound {
    Editor(EditorEvent),
    Player(PlayerCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    match cli.command {
        Command::Run => runtime.block_on(run_sidecar()),
        Command::Replay => runtime.block_on(run_replay()),
    }
}

fn build_engine(config: &Config) -> Result<Engine> {
    let backend =
        HttpBackendClient::new(config.api_url.clone()).context("Failed to create backend client")?;

    let player: Arc<dyn PlayerClient> = match &config.spotify_access_token {
        Some(token) => Arc::new(
            SpotifyWebPlayer::new(SPOTIFY_API_URL, token.clone())
                .context("Failed to create Spotify client")?,
        ),
        None => {
            info!("No Spotify token configured, player polling disabled");
            Arc::new(NoopPlayer)
        }
    };

    Ok(Engine::new(
        config,
        Collaborators {
            backend: Arc::new(backend),
            player,
            repo_info: Arc::new(GitRepoInfo),
            clock: Arc::new(SystemClock),
        },
    ))
}

async fn run_replay() -> Result<()> {
    init_logging();

    let config = Config::from_env().context("Failed to load configuration")?;
    if config.jwt.is_none() {
        warn!("MUSICTIME_JWT is not set, nothing can be delivered");
        return Ok(());
    }

    let engine = build_engine(&config)?;
    let delivered = engine.replay_offline().await;
    info!(records = delivered, "Replay finished");
    Ok(())
}

async fn run_sidecar() -> Result<()> {
    init_logging();

    info!("Starting Music Time plugin");

    let config = Config::from_env().context("Failed to load configuration")?;

    info!(
        api_url = %config.api_url,
        data_dir = %config.data_dir.display(),
        flush_interval_secs = config.flush_interval_secs,
        poll_interval_secs = config.poll_interval_secs,
        authenticated = config.jwt.is_some(),
        "Configuration loaded"
    );

    let engine = Arc::new(build_engine(&config)?);

    let (event_tx, mut event_rx) = mpsc::channel::<Inbound>(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(read_stdin(event_tx));

    let mut flush_interval = tokio::time::interval(Duration::from_secs(config.flush_interval_secs));
    flush_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut poll_interval = tokio::time::interval(Duration::from_secs(config.poll_interval_secs));
    poll_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Plugin running. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = wait_for_shutdown() => {
                info!("Shutdown signal received");
                break;
            }

            inbound = event_rx.recv() => {
                match inbound {
                    Some(Inbound::Editor(event)) => {
                        engine.handle_event(event).await;
                    }
                    Some(Inbound::Player(command)) => {
                        let engine = engine.clone();
                        tokio::spawn(async move { run_player_command(&engine, command).await });
                    }
                    None => {
                        info!("Editor closed stdin");
                        break;
                    }
                }
            }

            _ = flush_interval.tick() => {
                let engine = engine.clone();
                tokio::spawn(async move {
                    if let Some(report) = engine.flush_tick().await {
                        debug!(?report, "Flush tick finished");
                    }
                });
            }

            _ = poll_interval.tick() => {
                let engine = engine.clone();
                tokio::spawn(async move {
                    if let Some(outcome) = engine.poll_tick().await {
                        debug!(transition = ?outcome.transition, "Poll tick finished");
                    }
                });
            }
        }
    }

    info!("Shutting down...");
    engine.shutdown().await;
    info!("Plugin stopped");
    Ok(())
}

async fn run_player_command(engine: &Engine, command: PlayerCommand) {
    let result = match command {
        PlayerCommand::Play => engine.play().await,
        PlayerCommand::Pause => engine.pause().await,
        PlayerCommand::Next => engine.next().await,
        PlayerCommand::Previous => engine.previous().await,
    };
    if let Err(e) = result {
        warn!(?command, error = %e, "Player command failed");
    }
}

/// Forwards stdin lines to the engine until EOF.
async fn read_stdin(tx: mpsc::Sender<Inbound>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some(inbound) = parse_line(&line) else {
                    continue;
                };
                if tx.send(inbound).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read stdin");
                break;
            }
        }
    }
}

fn parse_line(line: &str) -> Option<Inbound> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Ok(event) = serde_json::from_str::<EditorEvent>(line) {
        return Some(Inbound::Editor(event));
    }
    match serde_json::from_str::<PlayerCommand>(line) {
        Ok(command) => Some(Inbound::Player(command)),
        Err(e) => {
            warn!(error = %e, "Ignoring malformed input line");
            None
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
