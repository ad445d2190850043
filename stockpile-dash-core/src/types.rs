//! Domain types for the Stockpile push channel
//!
//! Field names mirror the JSON the Stockpile server emits: cache payloads are
//! Go structs without JSON tags (PascalCase), the `system` handshake uses
//! camelCase tags.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Reads a field that may be `null` (Go's nil slices and maps) or of the
/// wrong shape; either way the field falls back to its default and the rest of
/// the payload is kept.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Like [`lenient`] for text fields, but scalars are rendered as text.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

// ============================================
// System handshake
// ============================================

/// A plugin loaded by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PluginInfo {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub version: String,
}

/// Payload of the `system` message, sent once per (re)connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SystemInfo {
    /// Full server version string
    #[serde(deserialize_with = "lenient_string")]
    pub version: String,
    /// False when the server platform cannot load plugins
    #[serde(deserialize_with = "lenient")]
    pub plugins_supported: bool,
    /// Loaded plugins, meaningful only when `plugins_supported` is set
    #[serde(deserialize_with = "lenient")]
    pub plugins: Vec<PluginInfo>,
}

// ============================================
// Cache events
// ============================================

/// Discriminator of a cache event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A display name was associated with a profile id
    ProfileId,
    /// A profile's name change history was refreshed
    NameHistory,
    /// A full profile (properties and textures) was refreshed
    Profile,
    /// The server blacklist was refreshed
    Blacklist,
}

impl EventKind {
    /// All kinds, in wire code order.
    pub const ALL: [EventKind; 4] = [
        EventKind::ProfileId,
        EventKind::NameHistory,
        EventKind::Profile,
        EventKind::Blacklist,
    ];

    /// Maps a wire code to a kind.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(EventKind::ProfileId),
            1 => Some(EventKind::NameHistory),
            2 => Some(EventKind::Profile),
            3 => Some(EventKind::Blacklist),
            _ => None,
        }
    }

    /// Maps a symbolic tag (`"ProfileIdEvent"`) to a kind.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ProfileIdEvent" => Some(EventKind::ProfileId),
            "NameHistoryEvent" => Some(EventKind::NameHistory),
            "ProfileEvent" => Some(EventKind::Profile),
            "BlacklistEvent" => Some(EventKind::Blacklist),
            _ => None,
        }
    }

    /// Wire code of this kind.
    pub fn code(self) -> i64 {
        match self {
            EventKind::ProfileId => 0,
            EventKind::NameHistory => 1,
            EventKind::Profile => 2,
            EventKind::Blacklist => 3,
        }
    }

    /// Short label for display.
    pub fn label(self) -> &'static str {
        match self {
            EventKind::ProfileId => "Profile ID",
            EventKind::NameHistory => "Name History",
            EventKind::Profile => "Profile",
            EventKind::Blacklist => "Blacklist",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The outer wrapper of a `cache` message, before classification.
///
/// The Go server serializes the discriminator as `Type`; `Kind` is accepted as well.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "Kind", alias = "Type", default)]
    pub kind: Option<Value>,
    #[serde(rename = "Key", default)]
    pub key: Value,
    #[serde(rename = "Object", default)]
    pub object: Value,
}

/// Name association payload. Timestamps stay in their wire encoding and are
/// parsed when rendered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ProfileIdPayload {
    #[serde(deserialize_with = "lenient")]
    pub id: Option<Uuid>,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub first_seen_at: String,
    #[serde(deserialize_with = "lenient_string")]
    pub last_seen_at: String,
    #[serde(deserialize_with = "lenient_string")]
    pub valid_until: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of a name change history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct NameChange {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub changed_to_at: String,
    #[serde(deserialize_with = "lenient_string")]
    pub valid_until: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct NameHistoryPayload {
    #[serde(deserialize_with = "lenient")]
    pub history: Vec<NameChange>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A signed profile property (serialized with lowercase tags by the server).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileProperty {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub value: String,
    #[serde(deserialize_with = "lenient_string")]
    pub signature: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ProfileTextures {
    #[serde(deserialize_with = "lenient_string")]
    pub timestamp: String,
    #[serde(deserialize_with = "lenient")]
    pub profile_id: Option<Uuid>,
    #[serde(deserialize_with = "lenient_string")]
    pub profile_name: String,
    /// Texture type (`SKIN`, `CAPE`) to URL
    #[serde(deserialize_with = "lenient")]
    pub textures: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ProfilePayload {
    #[serde(deserialize_with = "lenient")]
    pub id: Option<Uuid>,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient")]
    pub properties: BTreeMap<String, ProfileProperty>,
    #[serde(deserialize_with = "lenient")]
    pub textures: Option<ProfileTextures>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct BlacklistPayload {
    #[serde(deserialize_with = "lenient")]
    pub hashes: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A classified cache event body.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ProfileId(ProfileIdPayload),
    NameHistory(NameHistoryPayload),
    Profile(ProfilePayload),
    Blacklist(BlacklistPayload),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ProfileId(_) => EventKind::ProfileId,
            Event::NameHistory(_) => EventKind::NameHistory,
            Event::Profile(_) => EventKind::Profile,
            Event::Blacklist(_) => EventKind::Blacklist,
        }
    }
}

/// A cache event as it is kept in the history.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEvent {
    /// Classified payload
    pub event: Event,
    /// Cache key the server used for the entry (opaque)
    pub key: Value,
    /// Local wall-clock time the event was classified
    pub received_at: DateTime<Utc>,
}

impl CacheEvent {
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }

    /// One-line, human-readable description of the change.
    pub fn summary(&self) -> String {
        match &self.event {
            Event::ProfileId(p) => format!(
                "updated name association for name \"{}\" to profile {} (valid from {} until {})",
                p.name,
                display_id(p.id),
                p.first_seen_at,
                p.valid_until
            ),
            Event::NameHistory(_) => {
                format!("updated name history for profile {}", display_key(&self.key))
            }
            Event::Profile(p) => format!(
                "updated profile {} (display name: \"{}\")",
                display_id(p.id),
                p.name
            ),
            Event::Blacklist(b) => format!("updated blacklist ({} hashes)", b.hashes.len()),
        }
    }
}

/// Renders an optional profile id for display.
pub fn display_id(id: Option<Uuid>) -> String {
    id.map(|id| id.to_string())
        .unwrap_or_else(|| "<unknown>".to_string())
}

/// Renders an opaque cache key for display.
pub fn display_key(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Null => "<unknown>".to_string(),
        other => other.to_string(),
    }
}
