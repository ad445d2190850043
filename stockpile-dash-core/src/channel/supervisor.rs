//! Transport task: connects, keeps the Engine.IO session alive, and reconnects
//! with exponential backoff.
//!
//! Link states as seen through [`Inbound`]:
//!
//! ```text
//! Disconnected ──▶ Connecting{n} ──▶ Connected ──▶ Disconnected ──(backoff)──▶ Connecting{1}
//!                       │                                                          ▲
//!                       └──── failure ──▶ Disconnected ──(backoff)──▶ Connecting{n+1}
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::protocol::{EnginePacket, EngineRevision, SocketPacket, CONNECT_DEFAULT_NAMESPACE};
use super::{dispatch, route_event, Inbound};
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::state::PresentationState;

/// Queue depth between the transport task and the state owner.
const INBOUND_QUEUE: usize = 256;

/// How long to wait for the `open` packet after the WebSocket upgrade.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

/// Exponential reconnect delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            Duration::from_millis(config.reconnect_initial_ms),
            Duration::from_millis(config.reconnect_max_ms),
        )
    }

    /// Returns the delay to wait now and doubles the next one, up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Builds the WebSocket URL of the push channel.
///
/// `address` overrides the configured server address; `path_override`
/// replaces the configured channel path.
pub fn channel_url(
    config: &ServerConfig,
    address: Option<&str>,
    path_override: Option<&str>,
    revision: EngineRevision,
) -> Result<Url> {
    let scheme = if config.secure { "wss" } else { "ws" };
    let host = address.unwrap_or(&config.address).trim();
    let path = path_override.unwrap_or(&config.path);
    let path = path.trim_end_matches('/');

    let mut url = Url::parse(&format!("{scheme}://{host}{path}/"))?;
    url.query_pairs_mut()
        .append_pair("EIO", revision.query_value())
        .append_pair("transport", "websocket");
    Ok(url)
}

/// Owns the push channel configuration and starts sessions.
#[derive(Debug, Clone)]
pub struct ConnectionSupervisor {
    config: ServerConfig,
}

impl ConnectionSupervisor {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Starts the transport task and returns the handle the state owner drains.
    ///
    /// Never fails: an unusable address is reported as a `Disconnected`
    /// message. Must be called from within a Tokio runtime.
    pub fn connect(&self, address: Option<&str>, path_override: Option<&str>) -> ChannelHandle {
        let (tx, rx) = mpsc::channel(INBOUND_QUEUE);

        let target = EngineRevision::from_version(self.config.engine_io).and_then(|revision| {
            channel_url(&self.config, address, path_override, revision).map(|url| (url, revision))
        });

        let (url, task) = match target {
            Ok((url, revision)) => {
                tracing::info!(url = %url, "Starting push channel");
                let backoff = Backoff::from_config(&self.config);
                let task = tokio::spawn(run(url.clone(), revision, backoff, tx));
                (Some(url), task)
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot build push channel URL");
                let reason = e.to_string();
                let task = tokio::spawn(async move {
                    let _ = tx.send(Inbound::Disconnected { reason }).await;
                });
                (None, task)
            }
        };

        ChannelHandle {
            url,
            inbound: rx,
            task,
        }
    }
}

/// Receiving end of a push channel session.
pub struct ChannelHandle {
    url: Option<Url>,
    inbound: mpsc::Receiver<Inbound>,
    task: JoinHandle<()>,
}

impl ChannelHandle {
    /// Target URL, if the configured address was usable.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Applies every queued message to `state`, in delivery order. Returns the
    /// number of messages applied.
    pub fn drain(&mut self, state: &mut PresentationState) -> usize {
        let mut applied = 0;
        while let Ok(message) = self.inbound.try_recv() {
            dispatch(state, message);
            applied += 1;
        }
        applied
    }

    /// Waits for the next message. `None` once the transport task has ended.
    pub async fn next(&mut self) -> Option<Inbound> {
        self.inbound.recv().await
    }

    /// Stops the transport task.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

enum SessionEnd {
    /// Nobody is draining the queue any more
    ReceiverGone,
    Lost { established: bool, reason: String },
}

async fn run(url: Url, revision: EngineRevision, mut backoff: Backoff, tx: mpsc::Sender<Inbound>) {
    let mut attempt = 0u32;

    loop {
        attempt = attempt.saturating_add(1);
        if tx.send(Inbound::Connecting { attempt }).await.is_err() {
            return;
        }

        let (established, reason) = match run_session(&url, revision, &tx).await {
            SessionEnd::ReceiverGone => return,
            SessionEnd::Lost {
                established,
                reason,
            } => (established, reason),
        };

        if established {
            backoff.reset();
            attempt = 0;
        }

        let delay = backoff.next_delay();
        tracing::warn!(
            url = %url,
            reason = %reason,
            retry_in_ms = delay.as_millis() as u64,
            "Push channel lost"
        );
        if tx.send(Inbound::Disconnected { reason }).await.is_err() {
            return;
        }
        tokio::time::sleep(delay).await;
    }
}

/// Session bookkeeping shared by the frame handlers.
struct Session {
    revision: EngineRevision,
    established: bool,
    /// Silence tolerated before the link is considered dead
    liveness: Duration,
    heartbeat: Option<Interval>,
}

/// What the session loop should do after a frame.
enum Step {
    Continue,
    Reply(String),
    Forward(Inbound),
    End(String),
}

impl Session {
    fn lost(&self, reason: impl Into<String>) -> SessionEnd {
        SessionEnd::Lost {
            established: self.established,
            reason: reason.into(),
        }
    }

    fn on_frame(&mut self, frame: &str) -> Step {
        let packet = match EnginePacket::decode(frame) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!(error = %e, frame = %frame, "Dropping undecodable frame");
                return Step::Continue;
            }
        };

        match packet {
            EnginePacket::Open(handshake) => {
                tracing::debug!(
                    sid = %handshake.sid,
                    ping_interval = handshake.ping_interval,
                    ping_timeout = handshake.ping_timeout,
                    "Engine.IO session opened"
                );
                let interval = Duration::from_millis(handshake.ping_interval.max(1));
                self.liveness = interval + Duration::from_millis(handshake.ping_timeout);
                match self.revision {
                    EngineRevision::V3 => {
                        self.heartbeat =
                            Some(tokio::time::interval_at(Instant::now() + interval, interval));
                        Step::Continue
                    }
                    EngineRevision::V4 => Step::Reply(
                        EnginePacket::Message(CONNECT_DEFAULT_NAMESPACE.to_string()).encode(),
                    ),
                }
            }
            EnginePacket::Ping(data) => Step::Reply(EnginePacket::Pong(data).encode()),
            EnginePacket::Close => Step::End("closed by server".to_string()),
            EnginePacket::Message(data) => self.on_message(&data),
            EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => Step::Continue,
        }
    }

    fn on_message(&mut self, data: &str) -> Step {
        let packet = match SocketPacket::decode(data) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping undecodable Socket.IO packet");
                return Step::Continue;
            }
        };

        match packet {
            SocketPacket::Connect { namespace } if namespace == "/" => {
                if self.established {
                    Step::Continue
                } else {
                    self.established = true;
                    Step::Forward(Inbound::Connected)
                }
            }
            SocketPacket::Disconnect { namespace } if namespace == "/" => {
                Step::End("namespace disconnected by server".to_string())
            }
            SocketPacket::Error { namespace, payload } if namespace == "/" => {
                Step::End(format!("server refused connection: {payload}"))
            }
            SocketPacket::Event {
                namespace,
                name,
                payload,
            } if namespace == "/" => match route_event(&name, payload) {
                Some(inbound) => Step::Forward(inbound),
                None => Step::Continue,
            },
            SocketPacket::Binary => {
                tracing::debug!("Dropping binary Socket.IO packet");
                Step::Continue
            }
            other => {
                tracing::debug!(packet = ?other, "Ignoring Socket.IO packet");
                Step::Continue
            }
        }
    }
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn run_session(url: &Url, revision: EngineRevision, tx: &mpsc::Sender<Inbound>) -> SessionEnd {
    let mut session = Session {
        revision,
        established: false,
        liveness: HANDSHAKE_TIMEOUT,
        heartbeat: None,
    };

    let (ws, _response) = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok(connected) => connected,
        Err(e) => return session.lost(Error::from(e).to_string()),
    };
    let (mut sink, mut stream) = ws.split();
    let mut last_seen = Instant::now();

    loop {
        let deadline = last_seen + session.liveness;

        let step = tokio::select! {
            frame = stream.next() => {
                last_seen = Instant::now();
                match frame {
                    Some(Ok(Message::Text(text))) => session.on_frame(&text),
                    Some(Ok(Message::Binary(_))) => {
                        tracing::debug!("Dropping binary frame");
                        Step::Continue
                    }
                    Some(Ok(Message::Close(_))) | None => Step::End("connection closed".to_string()),
                    Some(Ok(_)) => Step::Continue,
                    Some(Err(e)) => Step::End(Error::from(e).to_string()),
                }
            }
            _ = tick(&mut session.heartbeat) => Step::Reply(EnginePacket::Ping(String::new()).encode()),
            _ = tokio::time::sleep_until(deadline) => Step::End("heartbeat timeout".to_string()),
        };

        match step {
            Step::Continue => {}
            Step::Reply(frame) => {
                if let Err(e) = sink.send(Message::Text(frame)).await {
                    return session.lost(Error::from(e).to_string());
                }
            }
            Step::Forward(inbound) => {
                if matches!(inbound, Inbound::System(_) | Inbound::RateLimit(_) | Inbound::Cache(_)) {
                    // Servers that skip the namespace ack still deliver events.
                    if !session.established {
                        session.established = true;
                        if tx.send(Inbound::Connected).await.is_err() {
                            return SessionEnd::ReceiverGone;
                        }
                    }
                }
                if tx.send(inbound).await.is_err() {
                    return SessionEnd::ReceiverGone;
                }
            }
            Step::End(reason) => {
                let _ = sink.close().await;
                return session.lost(reason);
            }
        }
    }
}
