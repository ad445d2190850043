//! Push channel supervision and message dispatch.
//!
//! ## Architecture
//!
//! ```text
//! WebSocket ─▶ supervisor task ─▶ mpsc<Inbound> ─▶ ChannelHandle::drain ─▶ PresentationState
//!              (framing, heartbeats,                 (owner's thread, one
//!               reconnect + backoff)                  message at a time)
//! ```
//!
//! The transport task never touches [`PresentationState`]. The owner of the
//! state drains the queue and the handlers below apply each message to
//! completion before the next, in delivery order.

pub mod protocol;
mod supervisor;

pub use supervisor::{channel_url, Backoff, ChannelHandle, ConnectionSupervisor};

use serde_json::Value;

use crate::classify::{classify_value, Rejected};
use crate::state::{LinkState, PresentationState};
use crate::types::{EventKind, SystemInfo};

/// Wire name of the server handshake message.
pub const SYSTEM_EVENT: &str = "system";
/// Wire name of the rate-limit allocation message.
pub const RATE_LIMIT_EVENT: &str = "rate-limit";
/// Wire name of the cache event message.
pub const CACHE_EVENT: &str = "cache";

/// A message delivered by the transport task.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A connection attempt started (1-based, reset after each established session)
    Connecting { attempt: u32 },
    /// The namespace handshake completed
    Connected,
    /// The link was lost or could not be established
    Disconnected { reason: String },
    System(SystemInfo),
    RateLimit(i64),
    /// Raw `cache` envelope, classified when applied
    Cache(Value),
}

/// What applying an [`Inbound`] did to the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Link(LinkState),
    System,
    RateLimit(i64),
    Event(EventKind),
    Rejected(Rejected),
}

/// Maps a Socket.IO event to an inbound message. Unknown names yield `None`.
pub fn route_event(name: &str, payload: Value) -> Option<Inbound> {
    match name {
        SYSTEM_EVENT => {
            let system = serde_json::from_value(payload).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "System message is not an object, using empty values");
                SystemInfo::default()
            });
            Some(Inbound::System(system))
        }
        RATE_LIMIT_EVENT => match payload.as_i64() {
            Some(allocation) => Some(Inbound::RateLimit(allocation)),
            None => {
                tracing::warn!(payload = %payload, "Ignoring non-integer rate-limit message");
                None
            }
        },
        CACHE_EVENT => Some(Inbound::Cache(payload)),
        other => {
            tracing::debug!(event = %other, "Ignoring unknown channel event");
            None
        }
    }
}

/// Applies one inbound message to the state.
pub fn dispatch(state: &mut PresentationState, message: Inbound) -> Applied {
    match message {
        Inbound::Connecting { attempt } => {
            state.connection.link = LinkState::Connecting { attempt };
            Applied::Link(state.connection.link)
        }
        Inbound::Connected => {
            on_connect(state);
            Applied::Link(LinkState::Connected)
        }
        Inbound::Disconnected { reason } => {
            tracing::info!(reason = %reason, "Push channel disconnected");
            on_disconnect(state);
            Applied::Link(LinkState::Disconnected)
        }
        Inbound::System(system) => {
            on_system(state, system);
            Applied::System
        }
        Inbound::RateLimit(allocation) => {
            on_rate_limit(state, allocation);
            Applied::RateLimit(allocation)
        }
        Inbound::Cache(raw) => match on_cache(state, raw) {
            Ok(kind) => Applied::Event(kind),
            Err(rejected) => Applied::Rejected(rejected),
        },
    }
}

pub fn on_connect(state: &mut PresentationState) {
    state.connection.link = LinkState::Connected;
}

/// Clears the link flag only; last known server info stays visible.
pub fn on_disconnect(state: &mut PresentationState) {
    state.connection.link = LinkState::Disconnected;
}

pub fn on_system(state: &mut PresentationState, system: SystemInfo) {
    tracing::info!(version = %system.version, "Connected to Stockpile server");

    if system.plugins_supported {
        tracing::info!(
            plugins = %system
                .plugins
                .iter()
                .map(|p| format!("{} v{}", p.name, p.version))
                .collect::<Vec<_>>()
                .join(", "),
            "Loaded plugins"
        );
        state.connection.plugins = system.plugins;
    } else {
        tracing::info!("Plugins are not supported by server");
        state.connection.plugins_unavailable = true;
    }

    state.connection.version = system.version;
}

pub fn on_rate_limit(state: &mut PresentationState, allocation: i64) {
    tracing::debug!(allocation, "Current rate limit allocation");
    state.connection.rate_limit_allocation = allocation;
}

/// Classifies a raw envelope and inserts it into the history.
pub fn on_cache(state: &mut PresentationState, raw: Value) -> Result<EventKind, Rejected> {
    match classify_value(raw) {
        Ok(event) => {
            let kind = event.kind();
            tracing::debug!(kind = %kind, summary = %event.summary(), "Cache event");
            state.last_event_at = Some(event.received_at);
            state.received_events += 1;
            state.history.insert(event);
            Ok(kind)
        }
        Err(rejected) => {
            tracing::warn!(reason = %rejected, "Rejected cache event");
            state.dropped_events += 1;
            Err(rejected)
        }
    }
}
