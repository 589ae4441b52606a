// Desired-state feed response types
//
// The feed answers `{ "tags": ..., "clients": [{ "id", "email" }] }` where
// `tags` is either a flat list (legacy, vless-only) or an object keyed by
// inbound group kind.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::Error;

/// Kind of inbound group a tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKind {
    /// Plain VLESS inbounds.
    Vless,
    /// VMess inbounds.
    Vmess,
    /// VLESS + REALITY inbounds; users carry the Vision flow.
    Reality,
}

impl GroupKind {
    pub const ALL: [Self; 3] = [Self::Vless, Self::Vmess, Self::Reality];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vless => "vless",
            Self::Vmess => "vmess",
            Self::Reality => "reality",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "vless" => Some(Self::Vless),
            "vmess" => Some(Self::Vmess),
            "reality" => Some(Self::Reality),
            _ => None,
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound tags partitioned by group kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundGroups {
    pub vless: Vec<String>,
    pub vmess: Vec<String>,
    pub reality: Vec<String>,
}

impl InboundGroups {
    pub fn get(&self, kind: GroupKind) -> &[String] {
        match kind {
            GroupKind::Vless => &self.vless,
            GroupKind::Vmess => &self.vmess,
            GroupKind::Reality => &self.reality,
        }
    }

    fn get_mut(&mut self, kind: GroupKind) -> &mut Vec<String> {
        match kind {
            GroupKind::Vless => &mut self.vless,
            GroupKind::Vmess => &mut self.vmess,
            GroupKind::Reality => &mut self.reality,
        }
    }

    pub fn is_empty(&self) -> bool {
        GroupKind::ALL.iter().all(|k| self.get(*k).is_empty())
    }

    /// Parse the `tags` field: a flat list or an object keyed by group kind.
    ///
    /// Keys are matched case-insensitively, unknown keys and non-string
    /// entries are ignored, blank tags are dropped.
    pub fn from_value(tags: &Value) -> Self {
        let mut groups = Self::default();
        match tags {
            Value::Array(items) => push_tags(&mut groups.vless, items),
            Value::Object(map) => {
                for (key, value) in map {
                    let Some(items) = value.as_array() else {
                        debug!(key, "ignoring non-list tag group");
                        continue;
                    };
                    match GroupKind::from_key(key) {
                        Some(kind) => push_tags(groups.get_mut(kind), items),
                        None => debug!(key, "ignoring unknown tag group"),
                    }
                }
            }
            _ => {}
        }
        groups
    }
}

fn push_tags(into: &mut Vec<String>, items: &[Value]) {
    for tag in items.iter().filter_map(Value::as_str).map(str::trim) {
        if !tag.is_empty() && !into.iter().any(|t| t == tag) {
            into.push(tag.to_owned());
        }
    }
}

/// A client entry as listed by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedClientEntry {
    /// Account secret (UUID).
    #[serde(default)]
    pub id: String,
    /// Unique user identifier on the proxy.
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    tags: Value,
    #[serde(default)]
    clients: Vec<FeedClientEntry>,
}

/// A decoded feed response plus the exact bytes it was decoded from.
#[derive(Debug, Clone)]
pub struct FeedResponse {
    pub groups: InboundGroups,
    pub clients: Vec<FeedClientEntry>,
    pub raw: Vec<u8>,
}

impl FeedResponse {
    pub fn parse(raw: Vec<u8>) -> Result<Self, Error> {
        let envelope: Envelope =
            serde_json::from_slice(&raw).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: preview(&raw),
            })?;

        Ok(Self {
            groups: InboundGroups::from_value(&envelope.tags),
            clients: envelope.clients,
            raw,
        })
    }
}

/// First 200 characters of a body, lossily decoded.
pub(crate) fn preview(body: &[u8]) -> String {
    String::from_utf8_lossy(body).chars().take(200).collect()
}
