//! Configuration for the xsync binary.
//!
//! A TOML file merged over built-in defaults and `XSYNC_`-prefixed
//! environment variables, feed token resolution (flag, env var, plaintext),
//! and translation into `xsync_core` runtime configs. The CLI layers its own
//! flag overrides on top.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use xsync_core::{
    FeedConfig, IdempotencyPolicy, RetryPolicy, StorageConfig, SyncConfig, SyncMode,
    UserDefaults, XrayConfig,
};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("missing {field}: set it in the config file, the environment, or with {flag}")]
    Missing { field: String, flag: String },

    #[error("no feed token configured")]
    NoToken,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub xray: XraySection,

    #[serde(default)]
    pub feed: FeedSection,

    #[serde(default)]
    pub sync: SyncSection,

    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub defaults: DefaultsSection,
}

/// Xray API listener.
#[derive(Debug, Deserialize, Serialize)]
pub struct XraySection {
    /// `host:port` of the Xray API inbound.
    #[serde(default = "default_address")]
    pub address: String,

    /// Per-call deadline in seconds.
    #[serde(default = "default_xray_timeout")]
    pub timeout_secs: u64,
}

impl Default for XraySection {
    fn default() -> Self {
        Self {
            address: default_address(),
            timeout_secs: default_xray_timeout(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:10085".into()
}
fn default_xray_timeout() -> u64 {
    8
}

/// Desired-state feed.
#[derive(Debug, Deserialize, Serialize)]
pub struct FeedSection {
    pub url: Option<String>,

    /// Feed token (plaintext; prefer `token_env`).
    pub token: Option<String>,

    /// Environment variable name containing the feed token.
    pub token_env: Option<String>,

    /// Public identifier of this server.
    pub server_id: Option<String>,

    #[serde(default = "default_feed_timeout")]
    pub timeout_secs: u64,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            token_env: None,
            server_id: None,
            timeout_secs: default_feed_timeout(),
        }
    }
}

fn default_feed_timeout() -> u64 {
    15
}

/// Reconciliation behaviour.
#[derive(Debug, Deserialize, Serialize)]
pub struct SyncSection {
    /// "replace" or "upsert".
    #[serde(default = "default_mode")]
    pub mode: String,

    #[serde(default)]
    pub reseed: bool,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Attempts per control-plane call.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Seconds between feed runs; 0 runs once.
    #[serde(default)]
    pub interval_secs: u64,

    /// "skip", "success" or "fail".
    #[serde(default = "default_idempotency")]
    pub idempotency: String,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            reseed: false,
            concurrency: default_concurrency(),
            retries: default_retries(),
            interval_secs: 0,
            idempotency: default_idempotency(),
        }
    }
}

fn default_mode() -> String {
    "replace".into()
}
fn default_concurrency() -> usize {
    8
}
fn default_retries() -> u32 {
    3
}
fn default_idempotency() -> String {
    "skip".into()
}

/// On-disk state.
#[derive(Debug, Deserialize, Serialize)]
pub struct StorageSection {
    /// Base path of the per-kind state stores.
    #[serde(default = "default_db")]
    pub db: PathBuf,

    #[serde(default = "default_snapshots")]
    pub snapshots: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            db: default_db(),
            snapshots: default_snapshots(),
        }
    }
}

fn default_db() -> PathBuf {
    PathBuf::from("/var/lib/xsync/users.json")
}
fn default_snapshots() -> PathBuf {
    PathBuf::from("/var/lib/xsync/snapshots")
}

/// Values for users the feed or CSV leave unspecified.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DefaultsSection {
    #[serde(default)]
    pub level: u32,

    /// VLESS flow for plain vless inbounds.
    #[serde(default)]
    pub flow: String,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "xsync", "xsync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("xsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
///
/// `path` overrides the default location. A missing file is not an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    figment_for(&path)
        .merge(Env::prefixed("XSYNC_").split("__"))
        .extract()
        .map_err(ConfigError::from)
}

/// Load from the file only, ignoring the environment.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    figment_for(path).extract().map_err(ConfigError::from)
}

fn figment_for(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Secret resolution ───────────────────────────────────────────────

/// Resolve the feed token: CLI flag, then `token_env`, then plaintext.
pub fn resolve_token(feed: &FeedSection, flag: Option<&str>) -> Result<SecretString, ConfigError> {
    // 1. Explicit flag
    if let Some(token) = flag.filter(|t| !t.is_empty()) {
        return Ok(SecretString::from(token.to_owned()));
    }

    // 2. Named env var
    if let Some(ref env_name) = feed.token_env {
        if let Ok(val) = std::env::var(env_name) {
            if !val.is_empty() {
                return Ok(SecretString::from(val));
            }
        }
    }

    // 3. Plaintext in config
    if let Some(ref token) = feed.token {
        if !token.is_empty() {
            return Ok(SecretString::from(token.clone()));
        }
    }

    Err(ConfigError::NoToken)
}

// ── Translation to core configs ─────────────────────────────────────

impl Config {
    pub fn xray_config(&self) -> XrayConfig {
        XrayConfig {
            address: self.xray.address.clone(),
            timeout: Duration::from_secs(self.xray.timeout_secs.max(1)),
        }
    }

    pub fn sync_config(&self) -> Result<SyncConfig, ConfigError> {
        let mode = SyncMode::from_str(&self.sync.mode).map_err(|_| ConfigError::Validation {
            field: "sync.mode".into(),
            reason: format!("expected 'replace' or 'upsert', got '{}'", self.sync.mode),
        })?;
        let idempotency = IdempotencyPolicy::from_str(&self.sync.idempotency).map_err(|_| {
            ConfigError::Validation {
                field: "sync.idempotency".into(),
                reason: format!(
                    "expected 'skip', 'success' or 'fail', got '{}'",
                    self.sync.idempotency
                ),
            }
        })?;

        Ok(SyncConfig {
            mode,
            reseed: self.sync.reseed,
            concurrency: self.sync.concurrency.max(1),
            retry: RetryPolicy::new(self.sync.retries, RetryPolicy::default().backoff_step),
            idempotency,
            ..SyncConfig::default()
        })
    }

    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            db: self.storage.db.clone(),
            snapshots: self.storage.snapshots.clone(),
        }
    }

    pub fn user_defaults(&self) -> UserDefaults {
        UserDefaults {
            level: self.defaults.level,
            flow: self.defaults.flow.trim().to_owned(),
        }
    }

    /// Feed settings with an already-resolved token.
    pub fn feed_config(&self, token: SecretString) -> Result<FeedConfig, ConfigError> {
        let raw_url = self.feed.url.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "feed.url".into(),
            flag: "--feed-url".into(),
        })?;
        let url = url::Url::parse(raw_url).map_err(|e| ConfigError::Validation {
            field: "feed.url".into(),
            reason: format!("{raw_url}: {e}"),
        })?;
        let server_id = self
            .feed
            .server_id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "feed.server_id".into(),
                flag: "--server-id".into(),
            })?;

        Ok(FeedConfig {
            url,
            token,
            server_id,
            timeout: Duration::from_secs(self.feed.timeout_secs.max(1)),
        })
    }

    /// Interval between feed runs, if periodic mode is configured.
    pub fn interval(&self) -> Option<Duration> {
        (self.sync.interval_secs > 0).then(|| Duration::from_secs(self.sync.interval_secs))
    }
}
