//! stockpile-status - display the current status of a Stockpile server
//!
//! Waits for the server's `system` handshake on the dashboard push channel
//! (and its first rate limit update) and prints them as a table. Exits with
//! an error when no handshake arrives within the timeout.

mod cli;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use stockpile_dash_core::channel::dispatch;
use stockpile_dash_core::{
    Applied, Config, ConnectionSupervisor, Inbound, PageOrigin, PresentationState,
};
use tokio::time::Instant;

use crate::cli::ServerArgs;

/// How long to wait for a rate limit update once the handshake arrived.
const RATE_LIMIT_GRACE: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "stockpile-status")]
#[command(about = "Display the current status of a Stockpile server")]
#[command(version)]
struct Args {
    #[command(flatten)]
    server: ServerArgs,

    /// Seconds to wait for the server handshake
    #[arg(short, long, default_value = "5")]
    timeout: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = cli::load_config(&args.server)?;

    let _log_guard = stockpile_dash_core::logging::init(&config.logging)
        .context("failed to initialize logging")?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let state = runtime.block_on(wait_for_handshake(
        config,
        Duration::from_secs(args.timeout),
    ))?;

    print!("{}", write_table(&status_rows(&state)));
    Ok(())
}

/// Collects server state until the handshake (plus a short grace period for
/// the rate limit) has arrived.
async fn wait_for_handshake(config: Config, timeout: Duration) -> Result<PresentationState> {
    let mut state = PresentationState::new(
        PageOrigin::from_server(&config.server),
        config.history.capacity,
    );
    let mut channel = ConnectionSupervisor::new(config.server.clone()).connect(None, None);

    let mut deadline = Instant::now() + timeout;
    let mut handshake = false;
    let mut rate_limit = false;
    let mut last_error: Option<String> = None;

    while !(handshake && rate_limit) {
        let message = match tokio::time::timeout_at(deadline, channel.next()).await {
            Ok(Some(message)) => message,
            Ok(None) | Err(_) => break,
        };

        if let Inbound::Disconnected { reason } = &message {
            last_error = Some(reason.clone());
        }

        match dispatch(&mut state, message) {
            Applied::System => {
                handshake = true;
                deadline = deadline.min(Instant::now() + RATE_LIMIT_GRACE);
            }
            Applied::RateLimit(_) => rate_limit = true,
            _ => {}
        }
    }

    channel.shutdown();

    if !handshake {
        let detail = last_error
            .map(|reason| format!(": {reason}"))
            .unwrap_or_default();
        bail!(
            "no handshake from server \"{}\" within {}s{}",
            state.address(),
            timeout.as_secs(),
            detail
        );
    }

    Ok(state)
}

fn status_rows(state: &PresentationState) -> Vec<(&'static str, Vec<String>)> {
    let plugins = if state.plugins_unavailable() {
        vec!["not supported".to_string()]
    } else if state.plugins().is_empty() {
        vec!["none".to_string()]
    } else {
        state
            .plugins()
            .iter()
            .map(|plugin| format!("{} v{}", plugin.name, plugin.version))
            .collect()
    };

    vec![
        ("Address", vec![state.address()]),
        ("Version", vec![state.version().to_string()]),
        ("Plugins", plugins),
        (
            "RateLimit",
            vec![format!(
                "{} / {} ({:.1}%)",
                state.rate_limit_allocation(),
                stockpile_dash_core::state::RATE_LIMIT_CEILING,
                state.rate_limit_percent()
            )],
        ),
    ]
}

/// Renders `Key | Value` rows; multi-valued keys continue on following lines.
fn write_table(rows: &[(&str, Vec<String>)]) -> String {
    let key_width = rows
        .iter()
        .map(|(key, _)| key.len())
        .max()
        .unwrap_or(0)
        .max(3);
    let value_width = rows
        .iter()
        .flat_map(|(_, values)| values.iter().map(String::len))
        .max()
        .unwrap_or(0)
        .max(5);
    let separator = format!("{}-+-{}\n", "-".repeat(key_width), "-".repeat(value_width));

    let mut out = format!("{:<key_width$} | Value\n", "Key");
    out.push_str(&separator);

    for (i, (key, values)) in rows.iter().enumerate() {
        for (j, value) in values.iter().enumerate() {
            let label = if j == 0 { *key } else { "" };
            out.push_str(&format!("{label:<key_width$} | {value}\n"));
        }
        if i + 1 != rows.len() {
            out.push_str(&separator);
        }
    }

    out
}
