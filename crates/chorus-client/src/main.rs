//! Chorus session client
//!
//! Joins a channel on a Chorus server, logs everything that happens in it,
//! and sends each line typed on stdin as a chat message.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chorus_client::{Client, SessionEvent, WebSocketTransport};
use chorus_core::config::{self, ClientConfig};

/// How long to wait for the server to acknowledge a close on exit
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "chorus-client")]
#[command(about = "Chorus client - presence, chat and server clock over one socket")]
#[command(version)]
struct Args {
    /// Server address
    /// Example: wss://chorus.example.net:8443
    address: Option<String>,

    /// Channel to join once connected
    #[arg(long)]
    channel: Option<String>,

    /// Display name to set once connected
    #[arg(long)]
    name: Option<String>,

    /// Single-use authentication token, sent with the first handshake
    #[arg(long, env = "CHORUS_TOKEN")]
    token: Option<String>,

    /// Keepalive interval in milliseconds
    #[arg(long)]
    keepalive_ms: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);

    let mut config = if config_path.exists() {
        config::load_config::<ClientConfig>(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        ClientConfig::default()
    };

    // Apply command-line overrides
    if let Some(address) = args.address {
        config.address = address;
    }
    if let Some(channel) = args.channel {
        config.desired_channel = Some(channel);
    }
    if let Some(token) = args.token {
        config.token = Some(token);
    }
    if let Some(ms) = args.keepalive_ms {
        config.keepalive_interval = Duration::from_millis(ms);
    }

    let (client, mut events) = Client::spawn(config, WebSocketTransport::new())
        .context("Invalid configuration (pass a server address or set it in the config file)")?;
    client.connect()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let disconnected = matches!(event, SessionEvent::Disconnected { .. });
                if matches!(event, SessionEvent::Connected) {
                    if let Some(name) = &args.name {
                        client.set_name(name.clone())?;
                    }
                }
                log_event(&event);
                if disconnected {
                    break;
                }
            }

            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        client.send_chat(line)?;
                    }
                }
                Ok(None) => {
                    tracing::debug!("stdin closed");
                    stdin_open = false;
                }
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, disconnecting...");
                client.disconnect()?;
                wait_for_disconnect(&mut events).await;
                break;
            }
        }
    }

    client.shutdown();
    Ok(())
}

async fn wait_for_disconnect(events: &mut chorus_client::EventStream) {
    let wait = async {
        while let Some(event) = events.recv().await {
            log_event(&event);
            if matches!(event, SessionEvent::Disconnected { .. }) {
                return;
            }
        }
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, wait).await.is_err() {
        tracing::debug!("Server did not acknowledge close within {:?}", SHUTDOWN_GRACE);
    }
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::Connected => tracing::info!("Connected"),
        SessionEvent::Disconnected { reason: Some(reason) } => {
            tracing::info!("Disconnected: {}", reason)
        }
        SessionEvent::Disconnected { reason: None } => tracing::info!("Disconnected"),
        SessionEvent::TransportError(e) => tracing::warn!("Transport error: {}", e),
        SessionEvent::ProtocolViolation(e) => tracing::warn!("Protocol violation: {}", e),
        SessionEvent::ChannelUpdated(channel) => tracing::info!("In channel {}", channel.id),
        SessionEvent::ParticipantJoined(p) => tracing::info!("{} ({}) joined", p.name, p.id),
        SessionEvent::ParticipantUpdated(p) => {
            tracing::debug!("{} ({}) at {:.1},{:.1}", p.name, p.id, p.x, p.y)
        }
        SessionEvent::ParticipantChanged(p) => tracing::debug!("{} ({}) changed", p.name, p.id),
        SessionEvent::ParticipantLeft(p) => tracing::info!("{} ({}) left", p.name, p.id),
        SessionEvent::RosterSizeChanged(count) => tracing::debug!("{} participants", count),
        SessionEvent::Unrecognized(command) => {
            tracing::info!("{}: {}", command.kind, command.payload)
        }
    }
}
