//! Presentation state consumed by the renderers.
//!
//! [`PresentationState`] is the single source of truth for the dashboard. It is
//! owned by the UI loop and mutated only through the channel handlers in
//! [`crate::channel`]; everything else reads it through accessors and derived
//! fields.

use chrono::{DateTime, Utc};

use crate::config::ServerConfig;
use crate::history::EventHistory;
use crate::types::{CacheEvent, PluginInfo};

/// Fixed rate-limit ceiling of the upstream profile API (requests per window).
pub const RATE_LIMIT_CEILING: i64 = 600;

/// Lifecycle of the push channel link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting {
        attempt: u32,
    },
    Connected,
}

/// Where the dashboard believes it was loaded from; only used for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOrigin {
    /// `host` or `host:port`
    pub host: String,
    /// Whether the secure scheme variant is in use
    pub secure: bool,
}

impl PageOrigin {
    pub fn new(host: impl Into<String>, secure: bool) -> Self {
        Self {
            host: host.into(),
            secure,
        }
    }

    pub fn from_server(config: &ServerConfig) -> Self {
        Self::new(config.address.trim(), config.secure)
    }
}

/// Display address for a host: unchanged when it names a port, otherwise
/// completed with the scheme's default port.
pub fn derive_address(host: &str, secure: bool) -> String {
    if host.contains(':') {
        return host.to_string();
    }
    if secure {
        format!("{host}:443")
    } else {
        format!("{host}:80")
    }
}

/// Server-reported facts plus the link flag.
///
/// Nothing here is reset on disconnect: the last known version and plugins stay
/// on screen until the next `system` handshake replaces them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub link: LinkState,
    pub version: String,
    pub plugins: Vec<PluginInfo>,
    pub plugins_unavailable: bool,
    pub rate_limit_allocation: i64,
}

/// Everything the dashboard renders.
#[derive(Debug, Clone)]
pub struct PresentationState {
    pub(crate) origin: PageOrigin,
    pub(crate) connection: ConnectionState,
    pub(crate) history: EventHistory<CacheEvent>,
    pub(crate) received_events: u64,
    pub(crate) dropped_events: u64,
    pub(crate) last_event_at: Option<DateTime<Utc>>,
}

impl PresentationState {
    pub fn new(origin: PageOrigin, history_capacity: usize) -> Self {
        Self {
            origin,
            connection: ConnectionState::default(),
            history: EventHistory::with_capacity(history_capacity),
            received_events: 0,
            dropped_events: 0,
            last_event_at: None,
        }
    }

    pub fn connected(&self) -> bool {
        self.connection.link == LinkState::Connected
    }

    pub fn link(&self) -> LinkState {
        self.connection.link
    }

    pub fn version(&self) -> &str {
        &self.connection.version
    }

    pub fn plugins(&self) -> &[PluginInfo] {
        &self.connection.plugins
    }

    pub fn plugins_unavailable(&self) -> bool {
        self.connection.plugins_unavailable
    }

    pub fn rate_limit_allocation(&self) -> i64 {
        self.connection.rate_limit_allocation
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    pub fn origin(&self) -> &PageOrigin {
        &self.origin
    }

    /// Address shown to the operator (`host:port`).
    pub fn address(&self) -> String {
        derive_address(&self.origin.host, self.origin.secure)
    }

    pub fn rate_limit_label(&self) -> String {
        format!(
            "Rate Limit: {} / {}",
            self.connection.rate_limit_allocation, RATE_LIMIT_CEILING
        )
    }

    /// Allocation as a percentage of the ceiling. Not clamped.
    pub fn rate_limit_percent(&self) -> f64 {
        self.connection.rate_limit_allocation as f64 / RATE_LIMIT_CEILING as f64 * 100.0
    }

    /// Allocation ratio clamped to `[0, 1]`, for gauge widgets.
    pub fn rate_limit_ratio(&self) -> f64 {
        (self.rate_limit_percent() / 100.0).clamp(0.0, 1.0)
    }

    pub fn history(&self) -> &EventHistory<CacheEvent> {
        &self.history
    }

    /// Events, newest first.
    pub fn events(&self) -> impl DoubleEndedIterator<Item = &CacheEvent> + ExactSizeIterator + '_ {
        self.history.iter()
    }

    /// Number of events accepted into the history since startup, including
    /// those evicted since.
    pub fn received_events(&self) -> u64 {
        self.received_events
    }

    /// Number of `cache` messages that failed classification.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        self.last_event_at
    }
}

impl Default for PresentationState {
    fn default() -> Self {
        Self::new(
            PageOrigin::from_server(&ServerConfig::default()),
            crate::history::DEFAULT_CAPACITY,
        )
    }
}
