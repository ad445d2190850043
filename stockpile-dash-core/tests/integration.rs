//! Integration tests for the push channel client
//!
//! These tests run a local WebSocket server that speaks just enough Engine.IO
//! and Socket.IO to drive the client through connect, event delivery,
//! disconnect and reconnect.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use stockpile_dash_core::channel::dispatch;
use stockpile_dash_core::config::ServerConfig;
use stockpile_dash_core::logging;
use stockpile_dash_core::{
    Applied, ChannelHandle, ConnectionSupervisor, Event, EventKind, Inbound, LinkState,
    PageOrigin, PresentationState,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

type ServerSocket = WebSocketStream<TcpStream>;

const V3_OPEN: &str = r#"0{"sid":"test-sid","upgrades":[],"pingInterval":25000,"pingTimeout":60000}"#;
const V4_OPEN: &str = r#"0{"sid":"test-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;

/// Accepts connections forever, handing each one to `handler` with its
/// zero-based connection index.
async fn spawn_server<F, Fut>(handler: F) -> SocketAddr
where
    F: Fn(usize, ServerSocket) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut index = 0;
        while let Ok((stream, _)) = listener.accept().await {
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            tokio::spawn(handler(index, ws));
            index += 1;
        }
    });
    addr
}

async fn send_all(ws: &mut ServerSocket, frames: &[String]) {
    for frame in frames {
        ws.send(Message::Text(frame.clone())).await.unwrap();
    }
}

/// Keeps the connection open until the client goes away.
async fn hold(ws: &mut ServerSocket) {
    while let Some(Ok(_)) = ws.next().await {}
}

fn event(name: &str, payload: serde_json::Value) -> String {
    format!("42{}", json!([name, payload]))
}

fn fast_config(addr: SocketAddr, engine_io: u8) -> ServerConfig {
    logging::init_test();
    ServerConfig {
        address: addr.to_string(),
        engine_io,
        reconnect_initial_ms: 10,
        reconnect_max_ms: 50,
        ..Default::default()
    }
}

async fn next_message(handle: &mut ChannelHandle) -> Inbound {
    tokio::time::timeout(Duration::from_secs(5), handle.next())
        .await
        .expect("timed out waiting for channel message")
        .expect("channel closed")
}

fn system_frame(version: &str) -> String {
    event(
        "system",
        json!({
            "version": version,
            "pluginsSupported": true,
            "plugins": [{"Name": "redis", "Version": "1.0.0"}]
        }),
    )
}

// ============================================
// Full Session
// ============================================

#[tokio::test]
async fn test_session_populates_state() {
    let addr = spawn_server(|_, mut ws| async move {
        send_all(
            &mut ws,
            &[
                V3_OPEN.to_string(),
                "40".to_string(),
                system_frame("2.0.0"),
                event("rate-limit", json!(450)),
                event(
                    "cache",
                    json!({
                        "Type": 2,
                        "Key": "069a79f4-44e9-4726-a5be-fca90e38aaf5",
                        "Object": {
                            "Id": "069a79f4-44e9-4726-a5be-fca90e38aaf5",
                            "Name": "Notch",
                            "Properties": null,
                            "Textures": null
                        }
                    }),
                ),
                event("cache", json!({"Type": 9, "Object": {}})),
                event("cache", json!({"Type": 3, "Object": {"Hashes": ["a", "b"]}})),
            ],
        )
        .await;
        hold(&mut ws).await;
    })
    .await;

    let config = fast_config(addr, 3);
    let mut state = PresentationState::new(PageOrigin::from_server(&config), 50);
    let mut channel = ConnectionSupervisor::new(config).connect(None, None);
    assert!(channel.url().unwrap().as_str().contains("EIO=3"));

    let mut applied = Vec::new();
    while applied.len() < 7 {
        let message = next_message(&mut channel).await;
        applied.push(dispatch(&mut state, message));
    }

    assert_eq!(
        applied,
        vec![
            Applied::Link(LinkState::Connecting { attempt: 1 }),
            Applied::Link(LinkState::Connected),
            Applied::System,
            Applied::RateLimit(450),
            Applied::Event(EventKind::Profile),
            applied[5].clone(),
            Applied::Event(EventKind::Blacklist),
        ]
    );
    assert!(matches!(applied[5], Applied::Rejected(_)));

    assert!(state.connected());
    assert_eq!(state.version(), "2.0.0");
    assert_eq!(state.plugins().len(), 1);
    assert_eq!(state.rate_limit_label(), "Rate Limit: 450 / 600");
    assert_eq!(state.rate_limit_percent(), 75.0);
    assert_eq!(state.dropped_events(), 1);

    let events: Vec<_> = state.events().collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind(), EventKind::Blacklist);
    match &events[1].event {
        Event::Profile(profile) => assert_eq!(profile.name, "Notch"),
        other => panic!("expected profile event, got {other:?}"),
    }

    channel.shutdown();
}

#[tokio::test]
async fn test_drain_applies_queued_messages() {
    let addr = spawn_server(|_, mut ws| async move {
        send_all(
            &mut ws,
            &[
                V3_OPEN.to_string(),
                "40".to_string(),
                system_frame("2.1.0"),
                event("rate-limit", json!(12)),
            ],
        )
        .await;
        hold(&mut ws).await;
    })
    .await;

    let config = fast_config(addr, 3);
    let mut state = PresentationState::default();
    let mut channel = ConnectionSupervisor::new(config).connect(None, None);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while state.rate_limit_allocation() != 12 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "state never caught up"
        );
        channel.drain(&mut state);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(state.connected());
    assert_eq!(state.version(), "2.1.0");
    channel.shutdown();
}

// ============================================
// Reconnect
// ============================================

#[tokio::test]
async fn test_reconnect_after_server_close() {
    let addr = spawn_server(|index, mut ws| async move {
        let version = if index == 0 { "1.0.0" } else { "1.1.0" };
        send_all(
            &mut ws,
            &[V3_OPEN.to_string(), "40".to_string(), system_frame(version)],
        )
        .await;
        if index == 0 {
            let _ = ws.close(None).await;
        } else {
            hold(&mut ws).await;
        }
    })
    .await;

    let mut state = PresentationState::default();
    let mut channel = ConnectionSupervisor::new(fast_config(addr, 3)).connect(None, None);

    // First session
    loop {
        let message = next_message(&mut channel).await;
        if dispatch(&mut state, message) == Applied::System {
            break;
        }
    }
    assert_eq!(state.version(), "1.0.0");

    // Link drops; last known info stays
    let message = next_message(&mut channel).await;
    assert!(matches!(message, Inbound::Disconnected { .. }));
    dispatch(&mut state, message);
    assert!(!state.connected());
    assert_eq!(state.version(), "1.0.0");
    assert_eq!(state.plugins().len(), 1);

    // Attempts restart at 1 after an established session
    let message = next_message(&mut channel).await;
    assert_eq!(message, Inbound::Connecting { attempt: 1 });
    dispatch(&mut state, message);

    loop {
        let message = next_message(&mut channel).await;
        if dispatch(&mut state, message) == Applied::System {
            break;
        }
    }
    assert!(state.connected());
    assert_eq!(state.version(), "1.1.0");

    channel.shutdown();
}

#[tokio::test]
async fn test_unreachable_server_keeps_retrying() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let mut channel = ConnectionSupervisor::new(fast_config(addr, 3)).connect(None, None);

    assert_eq!(
        next_message(&mut channel).await,
        Inbound::Connecting { attempt: 1 }
    );
    assert!(matches!(
        next_message(&mut channel).await,
        Inbound::Disconnected { .. }
    ));
    assert_eq!(
        next_message(&mut channel).await,
        Inbound::Connecting { attempt: 2 }
    );

    channel.shutdown();
}

#[tokio::test]
async fn test_unusable_address_reports_disconnect() {
    logging::init_test();
    let supervisor = ConnectionSupervisor::new(ServerConfig::default());
    let mut channel = supervisor.connect(Some("not a host"), None);

    assert!(channel.url().is_none());
    assert!(matches!(
        next_message(&mut channel).await,
        Inbound::Disconnected { .. }
    ));
    assert_eq!(channel.next().await, None);
}

// ============================================
// Engine.IO v4
// ============================================

#[tokio::test]
async fn test_v4_handshake_and_heartbeat() {
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<String>();

    let addr = spawn_server(move |_, mut ws| {
        let seen_tx = seen_tx.clone();
        async move {
            ws.send(Message::Text(V4_OPEN.to_string())).await.unwrap();

            // Namespace connect request
            if let Some(Ok(Message::Text(frame))) = ws.next().await {
                seen_tx.send(frame).unwrap();
            }

            ws.send(Message::Text("2".to_string())).await.unwrap();
            if let Some(Ok(Message::Text(frame))) = ws.next().await {
                seen_tx.send(frame).unwrap();
            }

            send_all(
                &mut ws,
                &[
                    r#"40{"sid":"ns-sid"}"#.to_string(),
                    event("rate-limit", json!(7)),
                ],
            )
            .await;
            hold(&mut ws).await;
        }
    })
    .await;

    let mut state = PresentationState::default();
    let mut channel = ConnectionSupervisor::new(fast_config(addr, 4)).connect(None, None);
    assert!(channel.url().unwrap().as_str().contains("EIO=4"));

    loop {
        let message = next_message(&mut channel).await;
        if dispatch(&mut state, message) == Applied::RateLimit(7) {
            break;
        }
    }
    assert!(state.connected());

    assert_eq!(seen_rx.recv().await.as_deref(), Some("40"));
    assert_eq!(seen_rx.recv().await.as_deref(), Some("3"));

    channel.shutdown();
}
