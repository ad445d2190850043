//! # stockpile-dash-core
//!
//! Core library for stockpile-dash - a live operator dashboard for a Stockpile
//! profile cache server.
//!
//! This library provides:
//! - Domain types for the push channel messages and cache events
//! - Classification of raw cache envelopes
//! - A bounded, newest-first event history
//! - The presentation state and the handlers that mutate it
//! - A supervised Socket.IO client with reconnect and backoff
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! ```text
//! server ─▶ channel (transport task) ─▶ Inbound queue ─▶ handlers ─▶ PresentationState ─▶ renderers
//!                                                           │
//!                                                     classify ─▶ EventHistory
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use stockpile_dash_core::{Config, ConnectionSupervisor, PageOrigin, PresentationState};
//!
//! # async fn run() {
//! let config = Config::load().expect("failed to load config");
//! let mut state = PresentationState::new(
//!     PageOrigin::from_server(&config.server),
//!     config.history.capacity,
//! );
//!
//! let mut channel = ConnectionSupervisor::new(config.server.clone()).connect(None, None);
//! channel.drain(&mut state);
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use channel::{Applied, ChannelHandle, ConnectionSupervisor, Inbound};
pub use classify::{classify, classify_value, Rejected};
pub use config::Config;
pub use error::{Error, Result};
pub use format::{calendar, CalendarLabel};
pub use history::EventHistory;
pub use state::{LinkState, PageOrigin, PresentationState};
pub use types::*;

// Public modules
pub mod channel;
pub mod classify;
pub mod config;
pub mod error;
pub mod format;
pub mod history;
pub mod logging;
pub mod state;
pub mod types;
