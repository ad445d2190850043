//! Classification of raw `cache` envelopes into typed events.
//!
//! This is the only gate into the event history: anything that is not one of
//! the four known kinds is rejected instead of inserted. Bodies of known kinds
//! are always accepted; fields that cannot be read fall back to empty values.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{CacheEvent, Event, EventKind, RawEnvelope};

/// Why an envelope was not accepted into the history.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejected {
    /// The message is not an envelope object at all
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Neither `Kind` nor `Type` was present
    #[error("envelope carries no event kind")]
    MissingKind,

    /// The discriminator names no known kind
    #[error("unrecognized event kind {0}")]
    UnknownKind(String),
}

/// Resolves an envelope discriminator, accepting wire codes (`0`, `"0"`) and
/// symbolic tags (`"ProfileIdEvent"`).
pub fn classify_kind(tag: &Value) -> Result<EventKind, Rejected> {
    let kind = match tag {
        Value::Number(n) => n.as_i64().and_then(EventKind::from_code),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(EventKind::from_code)
            .or_else(|| EventKind::from_name(s.trim())),
        _ => None,
    };
    kind.ok_or_else(|| Rejected::UnknownKind(tag.to_string()))
}

/// Key under which a body that is not an object is kept in the payload's
/// `extra` map.
pub const OPAQUE_BODY_KEY: &str = "Object";

fn payload<T: DeserializeOwned + Default>(kind: EventKind, object: Value) -> T {
    let object = match object {
        Value::Null => Value::Object(Map::new()),
        Value::Object(map) => Value::Object(map),
        other => {
            tracing::debug!(%kind, body = %other, "Cache body is not an object");
            let mut map = Map::new();
            map.insert(OPAQUE_BODY_KEY.to_string(), other);
            Value::Object(map)
        }
    };
    serde_json::from_value(object).unwrap_or_else(|e| {
        tracing::debug!(%kind, error = %e, "Unreadable cache body");
        T::default()
    })
}

/// Classifies an already-decoded envelope.
pub fn classify(envelope: RawEnvelope) -> Result<CacheEvent, Rejected> {
    let tag = envelope.kind.as_ref().ok_or(Rejected::MissingKind)?;
    let kind = classify_kind(tag)?;

    let event = match kind {
        EventKind::ProfileId => Event::ProfileId(payload(kind, envelope.object)),
        EventKind::NameHistory => Event::NameHistory(payload(kind, envelope.object)),
        EventKind::Profile => Event::Profile(payload(kind, envelope.object)),
        EventKind::Blacklist => Event::Blacklist(payload(kind, envelope.object)),
    };

    Ok(CacheEvent {
        event,
        key: envelope.key,
        received_at: Utc::now(),
    })
}

/// Classifies the raw JSON body of a `cache` message.
pub fn classify_value(raw: Value) -> Result<CacheEvent, Rejected> {
    if !raw.is_object() {
        return Err(Rejected::MalformedEnvelope(format!(
            "expected an object, got {}",
            raw
        )));
    }
    let envelope: RawEnvelope =
        serde_json::from_value(raw).map_err(|e| Rejected::MalformedEnvelope(e.to_string()))?;
    classify(envelope)
}
