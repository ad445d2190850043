//! stockpile-dash - Live operator dashboard for a Stockpile server
//!
//! Terminal UI showing the server's connection state, version, plugins, rate
//! limit allocation, and the most recent cache events as they are pushed.

mod app;
mod cli;
mod ui;

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use stockpile_dash_core::{ChannelHandle, ConnectionSupervisor, PageOrigin, PresentationState};

use crate::app::App;
use crate::cli::ServerArgs;

#[derive(Parser)]
#[command(name = "stockpile-dash")]
#[command(about = "Live operator dashboard for a Stockpile server")]
#[command(version)]
struct Args {
    #[command(flatten)]
    server: ServerArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = cli::load_config(&args.server)?;

    // Initialize logging (to file, not stdout since we have a TUI)
    let _log_guard = stockpile_dash_core::logging::init(&config.logging)
        .context("failed to initialize logging")?;

    tracing::info!("stockpile-dash TUI starting up");

    // The transport task runs on the runtime's workers; the UI loop stays on
    // this thread and owns the state.
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let _runtime_guard = runtime.enter();

    let mut channel = ConnectionSupervisor::new(config.server.clone()).connect(None, None);

    let state = PresentationState::new(
        PageOrigin::from_server(&config.server),
        config.history.capacity,
    );
    let mut app = App::new(state, channel.url().map(|url| url.to_string()));

    // Setup terminal
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

    // Run the main loop
    let result = run_app(&mut terminal, &mut app, &mut channel);

    // Restore terminal
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;

    channel.shutdown();
    tracing::info!("stockpile-dash TUI shutting down");

    result
}

/// Run the main application loop.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    channel: &mut ChannelHandle,
) -> Result<()> {
    loop {
        // Apply whatever the channel delivered since the last frame
        app.drain(channel);

        // Render
        terminal.draw(|frame| ui::render(frame, app))?;

        // Handle events
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        // Check if we should quit
        if app.should_quit {
            break;
        }
    }

    Ok(())
}
