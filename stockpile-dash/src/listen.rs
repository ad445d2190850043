//! stockpile-listen - print cache events pushed by a Stockpile server
//!
//! Connects to the server's dashboard push channel and prints one line per
//! cache event until interrupted. Connection changes and rate limit updates
//! are printed with `-v` / `-vv`.

mod cli;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use stockpile_dash_core::channel::dispatch;
use stockpile_dash_core::{
    Applied, Config, ConnectionSupervisor, Inbound, LinkState, PageOrigin, PresentationState,
};

use crate::cli::ServerArgs;

/// How often the loop wakes up to check for Ctrl+C while idle.
const IDLE_POLL: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "stockpile-listen")]
#[command(about = "Listen for cache events on a Stockpile server")]
#[command(version)]
struct Args {
    #[command(flatten)]
    server: ServerArgs,

    /// Verbose output (-v connection changes, -vv rate limit updates)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = cli::load_config(&args.server)?;

    let _log_guard = stockpile_dash_core::logging::init(&config.logging)
        .context("failed to initialize logging")?;

    tracing::info!("stockpile-listen starting");

    // Set up signal handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(listen(config, args.verbose, running));

    tracing::info!("stockpile-listen stopped");
    Ok(())
}

async fn listen(config: Config, verbose: u8, running: Arc<AtomicBool>) {
    let mut state = PresentationState::new(
        PageOrigin::from_server(&config.server),
        config.history.capacity,
    );
    let mut channel = ConnectionSupervisor::new(config.server.clone()).connect(None, None);

    match channel.url() {
        Some(url) => eprintln!("listening for events on {url}:"),
        None => eprintln!("listening for events:"),
    }

    while running.load(Ordering::SeqCst) {
        let message = match tokio::time::timeout(IDLE_POLL, channel.next()).await {
            Ok(Some(message)) => message,
            // Transport task is gone; nothing more will arrive
            Ok(None) => break,
            Err(_) => continue,
        };

        let reason = match &message {
            Inbound::Disconnected { reason } => Some(reason.clone()),
            _ => None,
        };

        let timestamp = chrono::Local::now().format("%H:%M:%S");

        match dispatch(&mut state, message) {
            Applied::Event(_) => {
                if let Some(event) = state.history().get(0) {
                    println!("[{}] {}", timestamp, event.summary());
                }
            }
            Applied::Rejected(rejected) if verbose >= 1 => {
                eprintln!("[{}] dropped cache event: {}", timestamp, rejected);
            }
            Applied::Link(LinkState::Connected) if verbose >= 1 => {
                eprintln!("[{}] connected", timestamp);
            }
            Applied::Link(LinkState::Disconnected) if verbose >= 1 => {
                eprintln!(
                    "[{}] disconnected: {}",
                    timestamp,
                    reason.unwrap_or_default()
                );
            }
            Applied::System if verbose >= 1 => {
                eprintln!(
                    "[{}] server version {}{}",
                    timestamp,
                    state.version(),
                    if state.plugins_unavailable() {
                        " (plugins not supported)"
                    } else {
                        ""
                    }
                );
            }
            Applied::RateLimit(_) if verbose >= 2 => {
                eprintln!("[{}] {}", timestamp, state.rate_limit_label());
            }
            _ => {}
        }
    }

    if verbose >= 1 {
        eprintln!(
            "--- {} events received, {} dropped ---",
            state.received_events(),
            state.dropped_events()
        );
    }

    channel.shutdown();
}
