// ── Core error types ──
//
// User-facing errors from xsync-core. Consumers never see gRPC status
// codes or HTTP bodies directly: the `From<xsync_api::Error>` impl
// translates wire-level errors into domain variants.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to control plane at {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Control plane timed out: {message}")]
    Timeout { message: String },

    #[error("No inbound tags to operate on")]
    NoTargets,

    // ── Operation errors ─────────────────────────────────────────────
    #[error("User already exists: {message}")]
    AlreadyExists { message: String },

    #[error("User not found: {message}")]
    NotFound { message: String },

    #[error("Operation rejected by control plane: {message}")]
    Rejected {
        message: String,
        /// gRPC status code name of the first rejecting inbound.
        code: Option<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Feed errors ──────────────────────────────────────────────────
    #[error("Feed error: {message}")]
    Feed {
        message: String,
        /// HTTP status code (if the feed answered at all).
        status: Option<u16>,
    },

    // ── Persistence errors ───────────────────────────────────────────
    #[error("State store {path}: {reason}")]
    Store { path: PathBuf, reason: String },

    #[error("Snapshot archive {path}: {reason}")]
    Snapshot { path: PathBuf, reason: String },

    #[error("Cannot read CSV {path}: {reason}")]
    Csv { path: PathBuf, reason: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn store(path: &Path, reason: impl ToString) -> Self {
        Self::Store {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn snapshot(path: &Path, reason: impl ToString) -> Self {
        Self::Snapshot {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

// ── Conversion from wire-level errors ────────────────────────────────

impl From<xsync_api::Error> for CoreError {
    fn from(err: xsync_api::Error) -> Self {
        match err {
            xsync_api::Error::InvalidAddress { address, reason } => CoreError::Config {
                message: format!("Invalid control-plane address '{address}': {reason}"),
            },
            xsync_api::Error::Connect { address, source } => CoreError::ConnectionFailed {
                address,
                reason: source.to_string(),
            },
            xsync_api::Error::NoTargets => CoreError::NoTargets,
            ref rejected @ xsync_api::Error::Rejected { .. } => {
                let message = rejected.to_string();
                if rejected.is_already_exists() {
                    CoreError::AlreadyExists { message }
                } else if rejected.is_not_found() {
                    CoreError::NotFound { message }
                } else if rejected.is_timeout() {
                    CoreError::Timeout { message }
                } else {
                    CoreError::Rejected {
                        message,
                        code: rejected.status_code().map(|c| format!("{c:?}")),
                    }
                }
            }
            xsync_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout {
                        message: e.to_string(),
                    }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        address: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Feed {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            xsync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            xsync_api::Error::FeedStatus { status, preview } => CoreError::Feed {
                message: format!("HTTP {status}: {preview}"),
                status: Some(status),
            },
            xsync_api::Error::Deserialization { message, body } => CoreError::Feed {
                message: format!("undecodable response ({message}): {body}"),
                status: None,
            },
        }
    }
}
