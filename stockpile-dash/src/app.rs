//! Application state for the TUI.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use stockpile_dash_core::{CacheEvent, ChannelHandle, PresentationState};

/// Rows moved by PageUp / PageDown.
const PAGE: usize = 10;

/// Main application state.
pub struct App {
    /// Everything received from the server
    pub state: PresentationState,
    /// Index of the selected event (0 = newest)
    pub selected: usize,
    /// Keep the newest event selected as events arrive
    pub follow: bool,
    /// Whether the app should quit
    pub should_quit: bool,
    /// Push channel URL, shown in the header
    pub channel_url: Option<String>,
    /// `received_events` at the last selection update
    seen_events: u64,
}

impl App {
    pub fn new(state: PresentationState, channel_url: Option<String>) -> Self {
        let seen_events = state.received_events();
        Self {
            state,
            selected: 0,
            follow: true,
            should_quit: false,
            channel_url,
            seen_events,
        }
    }

    /// Applies everything the channel has queued. Returns the number of
    /// messages applied.
    pub fn drain(&mut self, channel: &mut ChannelHandle) -> usize {
        let applied = channel.drain(&mut self.state);
        if applied > 0 {
            self.sync_selection();
        }
        applied
    }

    /// Keeps the selection on the same event when new ones are prepended, or
    /// on the newest one in follow mode.
    pub(crate) fn sync_selection(&mut self) {
        let received = self.state.received_events();
        let arrived = received.saturating_sub(self.seen_events) as usize;
        self.seen_events = received;

        if self.follow {
            self.selected = 0;
        } else {
            self.selected = self.selected.saturating_add(arrived);
        }
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        let last = self.state.events().len().saturating_sub(1);
        self.selected = self.selected.min(last);
    }

    pub fn selected_event(&self) -> Option<&CacheEvent> {
        self.state.history().get(self.selected)
    }

    /// Handle keyboard input.
    pub fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Down | KeyCode::Char('j') => {
                // Toward older events
                self.selected = self.selected.saturating_add(1);
                self.follow = false;
                self.clamp_selection();
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
                if self.selected == 0 {
                    self.follow = true;
                }
            }
            KeyCode::Char(' ') => {
                self.follow = !self.follow;
                if self.follow {
                    self.selected = 0;
                }
            }
            KeyCode::Home | KeyCode::Char('g') => {
                self.selected = 0;
                self.follow = true;
            }
            KeyCode::End | KeyCode::Char('G') => {
                self.selected = self.state.events().len().saturating_sub(1);
                self.follow = false;
            }
            KeyCode::PageUp | KeyCode::Char('u') => {
                self.selected = self.selected.saturating_sub(PAGE);
                if self.selected == 0 {
                    self.follow = true;
                }
            }
            KeyCode::PageDown | KeyCode::Char('d') => {
                self.selected = self.selected.saturating_add(PAGE);
                self.follow = false;
                self.clamp_selection();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stockpile_dash_core::channel::dispatch;
    use stockpile_dash_core::Inbound;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn push_events(app: &mut App, keys: std::ops::Range<usize>) {
        for i in keys {
            dispatch(
                &mut app.state,
                Inbound::Cache(json!({"Type": 3, "Key": i, "Object": {"Hashes": []}})),
            );
        }
        app.sync_selection();
    }

    #[test]
    fn test_follow_mode_tracks_newest() {
        let mut app = App::new(PresentationState::default(), None);
        push_events(&mut app, 0..5);
        assert!(app.follow);
        assert_eq!(app.selected, 0);
        assert_eq!(app.selected_event().unwrap().key, json!(4));
    }

    #[test]
    fn test_selection_sticks_when_not_following() {
        let mut app = App::new(PresentationState::default(), None);
        push_events(&mut app, 0..5);

        app.handle_key(key(KeyCode::Char('j')));
        app.handle_key(key(KeyCode::Char('j')));
        assert!(!app.follow);
        assert_eq!(app.selected_event().unwrap().key, json!(2));

        push_events(&mut app, 5..8);
        assert_eq!(app.selected, 5);
        assert_eq!(app.selected_event().unwrap().key, json!(2));
    }

    #[test]
    fn test_navigation_bounds() {
        let mut app = App::new(PresentationState::default(), None);
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.selected, 0);

        push_events(&mut app, 0..12);
        app.handle_key(key(KeyCode::Char('G')));
        assert_eq!(app.selected, 11);
        assert!(!app.follow);

        app.handle_key(key(KeyCode::PageDown));
        assert_eq!(app.selected, 11);

        app.handle_key(key(KeyCode::PageUp));
        assert_eq!(app.selected, 1);
        assert!(!app.follow);

        app.handle_key(key(KeyCode::Char('k')));
        assert_eq!(app.selected, 0);
        assert!(app.follow);
    }

    #[test]
    fn test_space_toggles_follow() {
        let mut app = App::new(PresentationState::default(), None);
        push_events(&mut app, 0..3);
        app.handle_key(key(KeyCode::Char('G')));

        app.handle_key(key(KeyCode::Char(' ')));
        assert!(app.follow);
        assert_eq!(app.selected, 0);

        app.handle_key(key(KeyCode::Char(' ')));
        assert!(!app.follow);
    }

    #[test]
    fn test_quit_keys() {
        let mut app = App::new(PresentationState::default(), None);
        app.handle_key(key(KeyCode::Char('q')));
        assert!(app.should_quit);

        let mut app = App::new(PresentationState::default(), None);
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }
}
