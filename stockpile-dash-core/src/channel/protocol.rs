//! Engine.IO / Socket.IO framing over WebSocket text frames.
//!
//! Only the subset needed by a receive-only client is implemented: the open
//! handshake, heartbeats, and text events on the default namespace.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Engine.IO protocol revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineRevision {
    /// Socket.IO 1.x/2.x servers: the client drives heartbeats
    V3,
    /// Socket.IO 3.x+ servers: the server pings and the client joins the namespace
    V4,
}

impl EngineRevision {
    pub fn from_version(version: u8) -> Result<Self> {
        match version {
            3 => Ok(EngineRevision::V3),
            4 => Ok(EngineRevision::V4),
            other => Err(Error::Protocol(format!(
                "unsupported Engine.IO revision {other}"
            ))),
        }
    }

    /// Value of the `EIO` query parameter.
    pub fn query_value(self) -> &'static str {
        match self {
            EngineRevision::V3 => "3",
            EngineRevision::V4 => "4",
        }
    }
}

/// Body of the Engine.IO `open` packet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    pub upgrades: Vec<String>,
    /// Milliseconds between heartbeats
    pub ping_interval: u64,
    /// Milliseconds to wait for a heartbeat before giving up
    pub ping_timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| Error::Protocol("empty Engine.IO frame".to_string()))?;
        let data = chars.as_str();

        match kind {
            '0' => Ok(EnginePacket::Open(serde_json::from_str(data)?)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(data.to_string())),
            '3' => Ok(EnginePacket::Pong(data.to_string())),
            '4' => Ok(EnginePacket::Message(data.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(Error::Protocol(format!(
                "unknown Engine.IO packet type {other:?}"
            ))),
        }
    }

    /// Encodes packets a client sends. `Open` is server-only and encodes as
    /// its bare type code.
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(_) => "0".to_string(),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{data}"),
            EnginePacket::Pong(data) => format!("3{data}"),
            EnginePacket::Message(data) => format!("4{data}"),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

/// Socket.IO packet carried inside an Engine.IO message.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect { namespace: String },
    Disconnect { namespace: String },
    Event {
        namespace: String,
        name: String,
        payload: Value,
    },
    Ack,
    Error { namespace: String, payload: Value },
    /// Binary events and acks; their attachments arrive as separate frames.
    Binary,
}

/// Namespace connect request for the default namespace.
pub const CONNECT_DEFAULT_NAMESPACE: &str = "0";

impl SocketPacket {
    pub fn decode(data: &str) -> Result<Self> {
        let mut chars = data.chars();
        let kind = chars
            .next()
            .ok_or_else(|| Error::Protocol("empty Socket.IO packet".to_string()))?;
        let rest = chars.as_str();

        if matches!(kind, '5' | '6') {
            return Ok(SocketPacket::Binary);
        }

        let (namespace, rest) = split_namespace(rest);
        // Acknowledgement id, if any
        let body = rest.trim_start_matches(|c: char| c.is_ascii_digit());

        match kind {
            '0' => Ok(SocketPacket::Connect { namespace }),
            '1' => Ok(SocketPacket::Disconnect { namespace }),
            '2' => {
                let (name, payload) = decode_event(body)?;
                Ok(SocketPacket::Event {
                    namespace,
                    name,
                    payload,
                })
            }
            '3' => Ok(SocketPacket::Ack),
            '4' => {
                let payload = if body.is_empty() {
                    Value::Null
                } else {
                    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
                };
                Ok(SocketPacket::Error { namespace, payload })
            }
            other => Err(Error::Protocol(format!(
                "unknown Socket.IO packet type {other:?}"
            ))),
        }
    }
}

fn split_namespace(rest: &str) -> (String, &str) {
    if !rest.starts_with('/') {
        return ("/".to_string(), rest);
    }
    match rest.find(',') {
        Some(idx) => (rest[..idx].to_string(), &rest[idx + 1..]),
        None => (rest.to_string(), ""),
    }
}

fn decode_event(body: &str) -> Result<(String, Value)> {
    let value: Value = serde_json::from_str(body)?;
    let Value::Array(mut items) = value else {
        return Err(Error::Protocol(format!("event body is not an array: {body}")));
    };
    if items.is_empty() {
        return Err(Error::Protocol("event body is empty".to_string()));
    }
    let name = match items.remove(0) {
        Value::String(name) => name,
        other => {
            return Err(Error::Protocol(format!("event name is not a string: {other}")));
        }
    };
    let payload = if items.is_empty() {
        Value::Null
    } else {
        items.swap_remove(0)
    };
    Ok((name, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_open() {
        let packet = EnginePacket::decode(
            r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":60000}"#,
        )
        .unwrap();
        assert_eq!(
            packet,
            EnginePacket::Open(Handshake {
                sid: "lv_VI97HAXpY6yYWAAAC".to_string(),
                upgrades: vec![],
                ping_interval: 25000,
                ping_timeout: 60000,
            })
        );
    }

    #[test]
    fn test_decode_heartbeats() {
        assert_eq!(
            EnginePacket::decode("2").unwrap(),
            EnginePacket::Ping(String::new())
        );
        assert_eq!(
            EnginePacket::decode("3probe").unwrap(),
            EnginePacket::Pong("probe".to_string())
        );
        assert_eq!(EnginePacket::decode("6").unwrap(), EnginePacket::Noop);
        assert!(EnginePacket::decode("").is_err());
        assert!(EnginePacket::decode("9").is_err());
    }

    #[test]
    fn test_encode() {
        assert_eq!(EnginePacket::Ping(String::new()).encode(), "2");
        assert_eq!(EnginePacket::Pong("probe".to_string()).encode(), "3probe");
        assert_eq!(
            EnginePacket::Message(CONNECT_DEFAULT_NAMESPACE.to_string()).encode(),
            "40"
        );
    }

    #[test]
    fn test_decode_event() {
        let packet = SocketPacket::decode(r#"2["rate-limit",120]"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                namespace: "/".to_string(),
                name: "rate-limit".to_string(),
                payload: json!(120),
            }
        );
    }

    #[test]
    fn test_decode_event_with_namespace_and_ack() {
        let packet = SocketPacket::decode(r#"2/admin,13["cache",{"Type":3}]"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                namespace: "/admin".to_string(),
                name: "cache".to_string(),
                payload: json!({"Type": 3}),
            }
        );
    }

    #[test]
    fn test_decode_event_without_payload() {
        let packet = SocketPacket::decode(r#"2["system"]"#).unwrap();
        assert!(matches!(packet, SocketPacket::Event { payload: Value::Null, .. }));
    }

    #[test]
    fn test_decode_connect_variants() {
        assert_eq!(
            SocketPacket::decode("0").unwrap(),
            SocketPacket::Connect {
                namespace: "/".to_string()
            }
        );
        assert_eq!(
            SocketPacket::decode(r#"0{"sid":"abc"}"#).unwrap(),
            SocketPacket::Connect {
                namespace: "/".to_string()
            }
        );
        assert_eq!(
            SocketPacket::decode("1/admin,").unwrap(),
            SocketPacket::Disconnect {
                namespace: "/admin".to_string()
            }
        );
    }

    #[test]
    fn test_decode_error_and_binary() {
        assert_eq!(
            SocketPacket::decode(r#"4"Invalid namespace""#).unwrap(),
            SocketPacket::Error {
                namespace: "/".to_string(),
                payload: json!("Invalid namespace"),
            }
        );
        assert_eq!(
            SocketPacket::decode(r#"51-["cache",{"_placeholder":true,"num":0}]"#).unwrap(),
            SocketPacket::Binary
        );
    }

    #[test]
    fn test_decode_malformed_events() {
        assert!(SocketPacket::decode(r#"2{"name":"cache"}"#).is_err());
        assert!(SocketPacket::decode("2[]").is_err());
        assert!(SocketPacket::decode("2[42]").is_err());
        assert!(SocketPacket::decode("2[not json").is_err());
    }

    #[test]
    fn test_revision() {
        assert_eq!(EngineRevision::from_version(3).unwrap(), EngineRevision::V3);
        assert_eq!(EngineRevision::V4.query_value(), "4");
        assert!(EngineRevision::from_version(2).is_err());
    }
}
