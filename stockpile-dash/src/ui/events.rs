use super::*;

use chrono::Local;
use ratatui::widgets::{
    List, ListItem, ListState, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
};
use stockpile_dash_core::format::calendar;
use stockpile_dash_core::{display_id, display_key, CacheEvent, Event};

/// Hashes listed in the blacklist detail before eliding the rest.
const BLACKLIST_PREVIEW: usize = 4;

/// Render the event stream, newest at the top.
pub(super) fn render_event_stream(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!(
        "Cache Events ({}){}",
        app.state.events().len(),
        if app.follow { " [follow]" } else { "" }
    );
    let block = panel(&title, BORDER_LIVE);

    if app.state.history().is_empty() {
        let placeholder = Paragraph::new("Waiting for cache events...")
            .style(Style::default().fg(DIM).italic())
            .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let items: Vec<ListItem> = app
        .state
        .events()
        .map(|event| ListItem::new(event_line(event)))
        .collect();
    let total = items.len();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::Rgb(40, 40, 60)).bold())
        .highlight_symbol("▶ ");

    let mut state = ListState::default().with_selected(Some(app.selected));
    frame.render_stateful_widget(list, area, &mut state);

    let visible_height = area.height.saturating_sub(2) as usize;
    if total > visible_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(None)
            .end_symbol(None);
        let mut scrollbar_state = ScrollbarState::new(total).position(app.selected);

        frame.render_stateful_widget(
            scrollbar,
            area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

/// Format a single event for the stream.
fn event_line(event: &CacheEvent) -> Line<'static> {
    // Format: HH:MM:SS [Kind        ] headline
    let time_str = event
        .received_at
        .with_timezone(&Local)
        .format("%H:%M:%S")
        .to_string();
    let kind = event.kind();

    Line::from(vec![
        Span::styled(time_str, Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
        Span::styled(
            format!("[{:<12}]", kind.label()),
            Style::default().fg(kind_color(kind)).bold(),
        ),
        Span::raw(" "),
        Span::styled(headline(event), Style::default().fg(Color::White)),
    ])
}

fn headline(event: &CacheEvent) -> String {
    match &event.event {
        Event::ProfileId(p) => format!("\"{}\" → {}", p.name, display_id(p.id)),
        Event::NameHistory(h) => format!(
            "{} ({} names)",
            display_key(&event.key),
            h.history.len()
        ),
        Event::Profile(p) => format!("{} ({})", p.name, display_id(p.id)),
        Event::Blacklist(b) => format!("{} hashes", b.hashes.len()),
    }
}

fn field(label: &str, value: impl Into<String>) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label:<14}"), Style::default().fg(LABEL_COLOR)),
        Span::styled(value.into(), Style::default().fg(Color::White)),
    ])
}

/// Render the selected event with the template of its kind.
pub(super) fn render_event_detail(frame: &mut Frame, app: &App, area: Rect) {
    let Some(event) = app.selected_event() else {
        let placeholder = Paragraph::new("No event selected")
            .style(Style::default().fg(DIM).italic())
            .block(panel("Detail", BORDER_DETAIL));
        frame.render_widget(placeholder, area);
        return;
    };

    let title = format!("{} Event", event.kind().label());
    let lines = detail_lines(event);

    let paragraph = Paragraph::new(lines)
        .block(panel(&title, BORDER_DETAIL))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn detail_lines(event: &CacheEvent) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    match &event.event {
        Event::ProfileId(p) => {
            lines.push(field("Name", p.name.clone()));
            lines.push(field("Profile", display_id(p.id)));
            lines.push(field("First seen", calendar(&p.first_seen_at).to_string()));
            if !p.last_seen_at.is_empty() {
                lines.push(field("Last seen", calendar(&p.last_seen_at).to_string()));
            }
            lines.push(field("Valid until", calendar(&p.valid_until).to_string()));
        }
        Event::NameHistory(h) => {
            lines.push(field("Profile", display_key(&event.key)));
            if h.history.is_empty() {
                lines.push(field("Names", "none"));
            }
            for change in &h.history {
                let since = if change.changed_to_at.is_empty() {
                    "original name".to_string()
                } else {
                    format!("since {}", calendar(&change.changed_to_at))
                };
                lines.push(Line::from(vec![
                    Span::styled(format!("{:<14}", change.name), Style::default().fg(Color::White)),
                    Span::styled(since, Style::default().fg(DIM)),
                ]));
            }
        }
        Event::Profile(p) => {
            lines.push(field("Name", p.name.clone()));
            lines.push(field("Profile", display_id(p.id)));
            if !p.properties.is_empty() {
                let names: Vec<&str> = p.properties.keys().map(String::as_str).collect();
                lines.push(field("Properties", names.join(", ")));
            }
            match &p.textures {
                Some(textures) => {
                    if !textures.timestamp.is_empty() {
                        lines.push(field("Textures at", calendar(&textures.timestamp).to_string()));
                    }
                    for (kind, url) in &textures.textures {
                        lines.push(field(kind, url.clone()));
                    }
                }
                None => lines.push(field("Textures", "none")),
            }
        }
        Event::Blacklist(b) => {
            lines.push(field("Hashes", b.hashes.len().to_string()));
            for hash in b.hashes.iter().take(BLACKLIST_PREVIEW) {
                lines.push(Line::from(Span::styled(
                    format!("  {hash}"),
                    Style::default().fg(DIM),
                )));
            }
            if b.hashes.len() > BLACKLIST_PREVIEW {
                lines.push(Line::from(Span::styled(
                    format!("  ... and {} more", b.hashes.len() - BLACKLIST_PREVIEW),
                    Style::default().fg(DIM).italic(),
                )));
            }
        }
    }

    lines.push(Line::from(vec![
        Span::styled(format!("{:<14}", "Received"), Style::default().fg(LABEL_COLOR)),
        Span::styled(format_relative_time(event.received_at), Style::default().fg(DIM)),
    ]));

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockpile_dash_core::{BlacklistPayload, NameChange, NameHistoryPayload};

    fn text(lines: &[Line]) -> String {
        lines
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_blacklist_detail_elides_long_lists() {
        let event = CacheEvent {
            event: Event::Blacklist(BlacklistPayload {
                hashes: (0..6).map(|i| format!("hash{i}")).collect(),
                ..Default::default()
            }),
            key: serde_json::Value::Null,
            received_at: Utc::now(),
        };

        let rendered = text(&detail_lines(&event));
        assert!(rendered.contains("hash3"));
        assert!(!rendered.contains("hash4"));
        assert!(rendered.contains("... and 2 more"));
        assert_eq!(headline(&event), "6 hashes");
    }

    #[test]
    fn test_name_history_detail() {
        let event = CacheEvent {
            event: Event::NameHistory(NameHistoryPayload {
                history: vec![
                    NameChange {
                        name: "Notch".to_string(),
                        ..Default::default()
                    },
                    NameChange {
                        name: "jeb_".to_string(),
                        changed_to_at: "not a date".to_string(),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }),
            key: serde_json::json!("069a79f4-44e9-4726-a5be-fca90e38aaf5"),
            received_at: Utc::now(),
        };

        let rendered = text(&detail_lines(&event));
        assert!(rendered.contains("original name"));
        assert!(rendered.contains("since Invalid date"));
        assert_eq!(
            headline(&event),
            "069a79f4-44e9-4726-a5be-fca90e38aaf5 (2 names)"
        );
    }
}
