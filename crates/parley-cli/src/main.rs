//! # parley
//!
//! Command-line client for a Parley conversation. `tail` keeps a bounded
//! window of the conversation and prints messages as they arrive; `send`
//! posts one message and waits for the server to echo it back.

#![deny(unsafe_code)]

mod wiring;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use parley_cache::{MessageWindow, WindowConfig};
use parley_core::logging::{init_json_subscriber, init_subscriber};
use parley_core::{ConnectionState, Envelope, EventAction, Message, Sender};
use parley_settings::{ParleySettings, WindowSettings};
use parley_transport::{StaticToken, TokenProvider, Transport, TransportConfig};
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::wiring::{Applied, AppliedSink, MessageRef};

/// Parley command-line client.
#[derive(Parser, Debug)]
#[command(name = "parley", about = "Tail or post to a Parley conversation", version)]
struct Cli {
    /// Settings file (defaults to `~/.parley/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Endpoint URL, overriding settings.
    #[arg(long, global = true)]
    url: Option<String>,

    /// Auth token appended to the endpoint URL.
    #[arg(long, env = "PARLEY_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print messages as they arrive until interrupted or the connection ends.
    Tail,
    /// Post one message and wait for the server to acknowledge it.
    Send {
        /// Message body.
        content: String,
        /// Sender participant ID.
        #[arg(long, default_value = "cli")]
        sender_id: String,
        /// Sender display name.
        #[arg(long, default_value = "parley")]
        sender_name: String,
        /// Seconds to wait for the echo.
        #[arg(long, default_value = "5")]
        wait_secs: u64,
    },
}

fn load(args: &Cli) -> Result<ParleySettings> {
    let path = args
        .settings
        .clone()
        .unwrap_or_else(parley_settings::settings_path);
    let mut settings = parley_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    if let Some(url) = &args.url {
        settings.transport.url.clone_from(url);
    }
    Ok(settings)
}

fn print_applied(applied: &Applied) {
    match applied {
        Applied::Added(message) => println!("{}", wiring::format_message(message)),
        Applied::Removed(message) => println!("(deleted) {}", wiring::format_message(message)),
        Applied::Updated(id) => println!("(edited {id})"),
        Applied::Duplicate(_) | Applied::Missing(_) | Applied::Ignored => {}
    }
}

/// Whether `tail` should stop: the transport has given up or been closed.
fn connection_ended(state: ConnectionState) -> bool {
    matches!(state, ConnectionState::Disconnected | ConnectionState::Error)
}

async fn tail(transport: &Transport, settings: &WindowSettings) -> Result<()> {
    let window = Arc::new(MessageWindow::new(WindowConfig::new(
        settings.window_size,
        settings.load_more_threshold,
    )));
    let sink: AppliedSink = Arc::new(print_applied);
    let _ = wiring::bind_window(transport, &window, &sink);
    let _ = transport.on_connection_change(|state| eprintln!("-- {state}"));

    transport.connect().await;
    if transport.connection_state() == ConnectionState::Error {
        bail!("Could not connect to {}", transport.config().url);
    }

    let mut states = transport.watch_state();
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl-c")?;
            info!("interrupted, shutting down");
        }
        ended = states.wait_for(|s| connection_ended(*s)) => {
            let state = ended.map_or(ConnectionState::Disconnected, |s| *s);
            warn!(state = %state, "connection ended");
        }
    }
    transport.disconnect();
    eprintln!("-- {} messages in window", window.len());
    Ok(())
}

async fn send(transport: &Transport, message: Message, wait: Duration) -> Result<()> {
    let echoed = Arc::new(Notify::new());
    let signal = echoed.clone();
    let id = message.id.clone();
    let _ = transport.on_message(
        EventAction::MessageSent.as_str(),
        move |envelope: &Envelope| {
            if envelope
                .data_as::<MessageRef>()
                .is_ok_and(|echo| echo.id == id)
            {
                signal.notify_one();
            }
        },
    );

    transport.connect().await;
    if !transport.is_connected() {
        bail!("Could not connect to {}", transport.config().url);
    }
    transport
        .send_message(&message)
        .context("Failed to send message")?;

    let acknowledged = tokio::time::timeout(wait, echoed.notified()).await.is_ok();
    transport.disconnect();
    if !acknowledged {
        bail!(
            "No acknowledgement for {} within {}s",
            message.id,
            wait.as_secs()
        );
    }
    println!("{}", wiring::format_message(&message));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = load(&args)?;

    if settings.logging.json {
        init_json_subscriber(&settings.logging.level);
    } else {
        init_subscriber(&settings.logging.level);
    }

    let config = TransportConfig::from_settings(&settings.transport)
        .context("Invalid transport settings")?;
    let tokens: Arc<dyn TokenProvider> = Arc::new(
        args.token
            .clone()
            .map_or_else(StaticToken::none, StaticToken::new),
    );
    let transport = Transport::tungstenite(config, tokens);
    let _ = transport.on_error(|e| eprintln!("error: {e}"));

    match args.command {
        Command::Tail => tail(&transport, &settings.window).await,
        Command::Send {
            content,
            sender_id,
            sender_name,
            wait_secs,
        } => {
            let message = Message::outgoing(Sender::new(sender_id, sender_name), content);
            send(&transport, message, Duration::from_secs(wait_secs)).await
        }
    }
}
