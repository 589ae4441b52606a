// ── Runtime configuration ──
//
// These types describe *what* a run should do and *where* to reach things.
// They never touch disk: the CLI builds them from files, env and flags and
// hands them in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::plan::SyncMode;
use crate::policy::IdempotencyPolicy;
use crate::retry::RetryPolicy;

/// Where the Xray API listener lives.
#[derive(Debug, Clone)]
pub struct XrayConfig {
    /// `host:port` or `http://host:port`.
    pub address: String,
    /// Per-call deadline.
    pub timeout: Duration,
}

impl Default for XrayConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:10085".into(),
            timeout: Duration::from_secs(8),
        }
    }
}

/// How to reach the desired-state feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: Url,
    pub token: SecretString,
    /// Public identifier of this server, sent as `public_id`.
    pub server_id: String,
    pub timeout: Duration,
}

/// Reconciliation behaviour.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub mode: SyncMode,
    pub reseed: bool,
    /// Worker pool size (minimum 1).
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub idempotency: IdempotencyPolicy,
    /// Periodic progress line; zero disables it.
    pub progress_interval: Duration,
    /// Also log progress every this many completed jobs; zero disables it.
    pub progress_every: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::default(),
            reseed: false,
            concurrency: 8,
            retry: RetryPolicy::default(),
            idempotency: IdempotencyPolicy::default(),
            progress_interval: Duration::from_secs(1),
            progress_every: 100,
        }
    }
}

/// On-disk locations.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Base path of the state stores; one file per inbound group kind is
    /// derived from it.
    pub db: PathBuf,
    /// Snapshot archive directory.
    pub snapshots: PathBuf,
}

/// Values applied to users the feed or CSV leave unspecified.
#[derive(Debug, Clone, Default)]
pub struct UserDefaults {
    pub level: u32,
    /// VLESS flow for plain vless inbounds; empty for none.
    pub flow: String,
}
