//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use xsync_config::ConfigError;
use xsync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const DEGRADED: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to the Xray API at {address}")]
    #[diagnostic(
        code(xsync::connection_failed),
        help(
            "Check that Xray is running with the API inbound enabled\n\
             (HandlerService) and listening on {address}.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { address: String, reason: String },

    #[error("Timed out: {message}")]
    #[diagnostic(
        code(xsync::timeout),
        help("Raise the per-call deadline with --timeout or check the server load.")
    )]
    Timeout { message: String },

    #[error("Feed request failed: {message}")]
    #[diagnostic(
        code(xsync::feed),
        help("Check [feed].url, the token and the server ID, then retry with -vv.")
    )]
    Feed {
        message: String,
        status: Option<u16>,
    },

    // ── Users ────────────────────────────────────────────────────────

    #[error("{message}")]
    #[diagnostic(
        code(xsync::not_found),
        help("Use --idempotency skip to treat a missing user as already removed.")
    )]
    NotFound { message: String },

    #[error("{message}")]
    #[diagnostic(
        code(xsync::conflict),
        help("Use --idempotency skip to treat an existing user as already added.")
    )]
    Conflict { message: String },

    #[error("Control plane rejected the request ({code}): {message}")]
    #[diagnostic(code(xsync::rejected))]
    Rejected { code: String, message: String },

    // ── Runs ─────────────────────────────────────────────────────────

    #[error("{failed} of {total} operations failed")]
    #[diagnostic(
        code(xsync::degraded),
        help("Failed users are logged at warn level; the next run retries them.")
    )]
    Degraded { failed: u64, total: u64 },

    #[error("{kinds} inbound group(s) could not be reconciled")]
    #[diagnostic(code(xsync::aborted), help("See the per-group errors above."))]
    KindsAborted { kinds: usize },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(xsync::validation))]
    Validation { field: String, reason: String },

    #[error("Missing {field}")]
    #[diagnostic(
        code(xsync::missing_setting),
        help("Pass {flag} or set it in the config file (`xsync config path`).")
    )]
    MissingSetting { field: String, flag: String },

    #[error("No feed token configured")]
    #[diagnostic(
        code(xsync::no_token),
        help(
            "Pass --token, set [feed].token_env to the name of an environment\n\
             variable holding it, or set [feed].token in the config file."
        )
    )]
    NoToken,

    // ── Configuration / persistence ──────────────────────────────────

    #[error("Configuration error: {message}")]
    #[diagnostic(code(xsync::config))]
    Config { message: String },

    #[error("Config file already exists at {path}")]
    #[diagnostic(code(xsync::config_exists), help("Use --force to overwrite it."))]
    ConfigExists { path: String },

    #[error("{message}")]
    #[diagnostic(code(xsync::storage))]
    Storage { message: String },

    #[error("Internal error: {0}")]
    #[diagnostic(code(xsync::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Feed { status: None, .. } => {
                exit_code::CONNECTION
            }
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Degraded { .. } | Self::KindsAborted { .. } => exit_code::DEGRADED,
            Self::Validation { .. } | Self::MissingSetting { .. } | Self::NoToken => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { address, reason } => {
                CliError::ConnectionFailed { address, reason }
            }

            CoreError::Timeout { message } => CliError::Timeout { message },

            CoreError::NoTargets => CliError::Validation {
                field: "--tag".into(),
                reason: "at least one non-blank inbound tag is required".into(),
            },

            CoreError::AlreadyExists { message } => CliError::Conflict { message },

            CoreError::NotFound { message } => CliError::NotFound { message },

            CoreError::Rejected { message, code } => CliError::Rejected {
                code: code.unwrap_or_else(|| "unknown".into()),
                message,
            },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Feed { message, status } => CliError::Feed { message, status },

            ref e @ (CoreError::Store { .. }
            | CoreError::Snapshot { .. }
            | CoreError::Csv { .. }) => CliError::Storage {
                message: e.to_string(),
            },

            CoreError::Config { message } => CliError::Config { message },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Missing { field, flag } => CliError::MissingSetting { field, flag },
            ConfigError::NoToken => CliError::NoToken,
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
