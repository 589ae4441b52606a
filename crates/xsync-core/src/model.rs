// ── Domain model ──
//
// The user record the engine diffs, persists and pushes to the control
// plane. The record ID (an email-like string) is the diff key; every other
// field participates in change detection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use xsync_api::Account;

/// Flow value for VLESS + XTLS Vision inbounds.
pub const VISION_FLOW: &str = "xtls-rprx-vision";

/// Proxy account protocol.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Protocol {
    Vless,
    Vmess,
}

/// A user as known to the state store and the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique key; sent to the control plane as the user's email.
    #[serde(alias = "uid")]
    pub id: String,
    #[serde(rename = "proto")]
    pub protocol: Protocol,
    /// Account UUID.
    #[serde(rename = "uuid")]
    pub secret_id: String,
    #[serde(default)]
    pub level: u32,
    /// Only meaningful for vless; empty means plain VLESS.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flow: String,
}

/// Users keyed by ID. Ordered so persisted files diff cleanly.
pub type UserMap = BTreeMap<String, User>;

impl User {
    pub fn vless(
        id: impl Into<String>,
        secret_id: impl Into<String>,
        level: u32,
        flow: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            protocol: Protocol::Vless,
            secret_id: secret_id.into(),
            level,
            flow: flow.into().trim().to_owned(),
        }
    }

    pub fn vmess(id: impl Into<String>, secret_id: impl Into<String>, level: u32) -> Self {
        Self {
            id: id.into(),
            protocol: Protocol::Vmess,
            secret_id: secret_id.into(),
            level,
            flow: String::new(),
        }
    }

    /// The flow the control plane sees: always empty for vmess.
    pub fn effective_flow(&self) -> &str {
        match self.protocol {
            Protocol::Vless => self.flow.trim(),
            Protocol::Vmess => "",
        }
    }

    /// Field-wise equality used by the diff. The ID is the key and is not
    /// compared; flow is only compared for vless.
    pub fn same_as(&self, other: &Self) -> bool {
        self.secret_id == other.secret_id
            && self.protocol == other.protocol
            && self.level == other.level
            && self.effective_flow() == other.effective_flow()
    }

    /// Protocol-specific account payload for the control plane.
    pub fn account(&self) -> Account {
        match self.protocol {
            Protocol::Vless => Account::vless(&self.secret_id, self.effective_flow()),
            Protocol::Vmess => Account::vmess(&self.secret_id),
        }
    }
}
