//! UI rendering for the TUI.

mod events;

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Gauge, Paragraph},
    Frame,
};
use stockpile_dash_core::format::format_relative_time;
use stockpile_dash_core::{EventKind, LinkState};

use crate::app::App;

// ========== Colors ==========

/// Link indicator when connected
const LIVE_INDICATOR: Color = Color::Rgb(50, 255, 50);
/// Link indicator while connecting
const PENDING_INDICATOR: Color = Color::Rgb(255, 200, 0);
/// Link indicator when disconnected
const DOWN_INDICATOR: Color = Color::Rgb(255, 80, 80);
/// Border color for server panels
const BORDER_INFO: Color = Color::Rgb(0, 150, 150);
/// Border color for the event stream
const BORDER_LIVE: Color = Color::Rgb(50, 200, 50);
/// Border color for the event detail
const BORDER_DETAIL: Color = Color::Rgb(180, 100, 180);
/// Label color for metadata attributes
const LABEL_COLOR: Color = Color::Rgb(100, 180, 180);
/// Bright cyan for key hints
const ACCENT_CYAN: Color = Color::Rgb(0, 255, 255);
/// Dim gray for secondary text
const DIM: Color = Color::Rgb(128, 128, 128);

/// Badge color per event kind.
fn kind_color(kind: EventKind) -> Color {
    match kind {
        EventKind::ProfileId => Color::Cyan,
        EventKind::NameHistory => Color::Yellow,
        EventKind::Profile => Color::Magenta,
        EventKind::Blacklist => Color::Rgb(255, 127, 80),
    }
}

fn panel(title: &str, border: Color) -> Block<'static> {
    Block::default()
        .title(format!(" {title} "))
        .title_style(Style::default().fg(border).bold())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border))
}

/// Render the application UI.
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let plugin_rows = app.state.plugins().len().clamp(1, 4) as u16;

    // Layout: header, server panels, event stream, event detail, footer
    let chunks = Layout::vertical([
        Constraint::Length(3),               // Header
        Constraint::Length(plugin_rows + 2), // Plugins | Rate limit
        Constraint::Min(5),                  // Event stream
        Constraint::Length(9),               // Event detail
        Constraint::Length(1),               // Footer
    ])
    .split(area);

    render_header(frame, app, chunks[0]);

    let middle = Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);
    render_plugins_panel(frame, app, middle[0]);
    render_rate_limit_panel(frame, app, middle[1]);

    events::render_event_stream(frame, app, chunks[2]);
    events::render_event_detail(frame, app, chunks[3]);

    render_footer(frame, app, chunks[4]);
}

fn link_indicator(link: LinkState) -> Span<'static> {
    match link {
        LinkState::Connected => Span::styled("● Connected", Style::default().fg(LIVE_INDICATOR).bold()),
        LinkState::Connecting { attempt } => Span::styled(
            format!("◌ Connecting (attempt {attempt})"),
            Style::default().fg(PENDING_INDICATOR).bold(),
        ),
        LinkState::Disconnected => {
            Span::styled("○ Disconnected", Style::default().fg(DOWN_INDICATOR).bold())
        }
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let block = panel("Stockpile", BORDER_INFO);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let version = if app.state.version().is_empty() {
        "unknown".to_string()
    } else {
        app.state.version().to_string()
    };

    let mut spans = vec![
        Span::raw(" "),
        link_indicator(app.state.link()),
        Span::styled("  │  ", Style::default().fg(DIM)),
        Span::styled("Server ", Style::default().fg(LABEL_COLOR)),
        Span::styled(version, Style::default().fg(Color::White).bold()),
        Span::styled("  │  ", Style::default().fg(DIM)),
        Span::styled("Address ", Style::default().fg(LABEL_COLOR)),
        Span::styled(app.state.address(), Style::default().fg(Color::White)),
    ];
    if let Some(url) = &app.channel_url {
        spans.push(Span::styled("  │  ", Style::default().fg(DIM)));
        spans.push(Span::styled(url.clone(), Style::default().fg(DIM)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), inner);
}

fn render_plugins_panel(frame: &mut Frame, app: &App, area: Rect) {
    let block = panel("Plugins", BORDER_INFO);

    let lines: Vec<Line> = if app.state.plugins_unavailable() {
        vec![Line::from(Span::styled(
            "Plugins are not supported by this server",
            Style::default().fg(DIM).italic(),
        ))]
    } else if app.state.plugins().is_empty() {
        vec![Line::from(Span::styled(
            "No plugins loaded",
            Style::default().fg(DIM).italic(),
        ))]
    } else {
        app.state
            .plugins()
            .iter()
            .map(|plugin| {
                Line::from(vec![
                    Span::styled(plugin.name.clone(), Style::default().fg(Color::White)),
                    Span::styled(format!(" v{}", plugin.version), Style::default().fg(DIM)),
                ])
            })
            .collect()
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_rate_limit_panel(frame: &mut Frame, app: &App, area: Rect) {
    let ratio = app.state.rate_limit_ratio();
    let color = if ratio >= 0.9 {
        DOWN_INDICATOR
    } else if ratio >= 0.6 {
        PENDING_INDICATOR
    } else {
        LIVE_INDICATOR
    };

    let gauge = Gauge::default()
        .block(panel("Rate Limit", BORDER_INFO))
        .gauge_style(Style::default().fg(color))
        .ratio(ratio)
        .label(format!(
            "{} ({:.0}%)",
            app.state.rate_limit_label(),
            app.state.rate_limit_percent()
        ));

    frame.render_widget(gauge, area);
}

/// Render the footer with key hints and counters.
fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let key_style = Style::default().fg(ACCENT_CYAN).bold();
    let label_style = Style::default().fg(Color::DarkGray);
    let separator = Span::styled("  │  ", Style::default().fg(Color::DarkGray));

    let last_event = app
        .state
        .last_event_at()
        .map(format_relative_time)
        .unwrap_or_else(|| "never".to_string());

    let follow = if app.follow { "on" } else { "off" };

    let footer = Paragraph::new(Line::from(vec![
        Span::styled(" ", Style::default()),
        Span::styled("[j/k]", key_style),
        Span::styled(" Select  ", label_style),
        separator.clone(),
        Span::styled("[g/G]", key_style),
        Span::styled(" Newest/Oldest  ", label_style),
        separator.clone(),
        Span::styled("[Space]", key_style),
        Span::styled(format!(" Follow ({follow})  "), label_style),
        separator.clone(),
        Span::styled("[q]", key_style),
        Span::styled(" Quit", label_style),
        separator,
        Span::styled(
            format!(
                "{} received, {} dropped, last {}",
                app.state.received_events(),
                app.state.dropped_events(),
                last_event
            ),
            Style::default().fg(DIM),
        ),
    ]));

    frame.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};
    use serde_json::json;
    use stockpile_dash_core::channel::dispatch;
    use stockpile_dash_core::{Inbound, PresentationState, SystemInfo};

    fn rendered(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(140, 40)).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_render_populated_dashboard() {
        let mut app = App::new(PresentationState::default(), None);
        dispatch(&mut app.state, Inbound::Connected);
        dispatch(
            &mut app.state,
            Inbound::System(SystemInfo {
                version: "2.0.0".to_string(),
                plugins_supported: false,
                plugins: vec![],
            }),
        );
        dispatch(&mut app.state, Inbound::RateLimit(300));
        dispatch(
            &mut app.state,
            Inbound::Cache(json!({
                "Type": 0,
                "Key": "notch",
                "Object": {
                    "Id": "069a79f4-44e9-4726-a5be-fca90e38aaf5",
                    "Name": "Notch",
                    "FirstSeenAt": "garbage",
                    "ValidUntil": "garbage"
                }
            })),
        );
        app.sync_selection();

        let screen = rendered(&app);
        assert!(screen.contains("Connected"));
        assert!(screen.contains("2.0.0"));
        assert!(screen.contains("127.0.0.1:36623"));
        assert!(screen.contains("Plugins are not supported"));
        assert!(screen.contains("Rate Limit: 300 / 600 (50%)"));
        assert!(screen.contains("Notch"));
        assert!(screen.contains("Invalid date"));
        assert!(screen.contains("1 received, 0 dropped"));
    }

    #[test]
    fn test_render_empty_dashboard() {
        let app = App::new(PresentationState::default(), None);
        let screen = rendered(&app);
        assert!(screen.contains("Disconnected"));
        assert!(screen.contains("No plugins loaded"));
        assert!(screen.contains("Waiting for cache events"));
    }
}
