use std::fmt;

use thiserror::Error;
use tonic::Code;

/// The control-plane operation a fan-out call was performing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcOp {
    AddUser,
    RemoveUser,
}

impl fmt::Display for RpcOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddUser => f.write_str("add-user"),
            Self::RemoveUser => f.write_str("remove-user"),
        }
    }
}

/// One inbound tag that rejected a fan-out call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFailure {
    pub tag: String,
    pub code: Code,
    pub message: String,
}

impl TagFailure {
    pub fn new(tag: impl Into<String>, code: Code, message: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            code,
            message: message.into(),
        }
    }

    /// The user is already present on this inbound.
    ///
    /// Xray reports this as `Unknown` with an "already exists" message on most
    /// versions, so the message is checked as well as the status code.
    pub fn is_already_exists(&self) -> bool {
        self.code == Code::AlreadyExists || contains_ignore_case(&self.message, "already exists")
    }

    /// The user is absent from this inbound.
    pub fn is_not_found(&self) -> bool {
        self.code == Code::NotFound || contains_ignore_case(&self.message, "not found")
    }
}

impl fmt::Display for TagFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag={} code={:?} err={}", self.tag, self.code, self.message)
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_ascii_lowercase().contains(needle)
}

fn render_failures(failures: &[TagFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Top-level error type for the `xsync-api` crate.
///
/// Covers both wire surfaces: the Xray gRPC control plane and the HTTP
/// desired-state feed. `xsync-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Control plane: connection ───────────────────────────────────
    /// The control-plane address could not be turned into an endpoint.
    #[error("Invalid control-plane address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Dialing the control plane failed (refused, unreachable, timed out).
    #[error("Cannot connect to control plane at {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: tonic::transport::Error,
    },

    /// The client was built without any inbound tags to fan out to.
    #[error("No inbound tags configured")]
    NoTargets,

    // ── Control plane: RPC ──────────────────────────────────────────
    /// One or more inbound tags rejected a fan-out call.
    ///
    /// Tags that accepted the call are not listed; `total` is the number of
    /// tags the call was sent to.
    #[error("{op} rejected by {}/{total} inbound(s): {}", .failures.len(), render_failures(.failures))]
    Rejected {
        op: RpcOp,
        total: usize,
        failures: Vec<TagFailure>,
    },

    // ── Feed ────────────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The feed answered with a non-2xx status.
    #[error("Feed returned HTTP {status}: {preview}")]
    FeedStatus { status: u16, preview: String },

    /// JSON deserialization failed, with a body preview for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Build a `Rejected` error for a single tag. Mostly useful to test doubles.
    pub fn rejected(op: RpcOp, tag: impl Into<String>, code: Code, message: impl Into<String>) -> Self {
        Self::Rejected {
            op,
            total: 1,
            failures: vec![TagFailure::new(tag, code, message)],
        }
    }

    /// Per-tag failures, empty for non-RPC errors.
    pub fn failures(&self) -> &[TagFailure] {
        match self {
            Self::Rejected { failures, .. } => failures,
            _ => &[],
        }
    }

    /// Returns `true` if every rejecting tag reported the user as already present.
    pub fn is_already_exists(&self) -> bool {
        let failures = self.failures();
        !failures.is_empty() && failures.iter().all(TagFailure::is_already_exists)
    }

    /// Returns `true` if every rejecting tag reported the user as absent.
    pub fn is_not_found(&self) -> bool {
        let failures = self.failures();
        !failures.is_empty() && failures.iter().all(TagFailure::is_not_found)
    }

    /// Returns `true` if every rejecting tag hit its call deadline.
    pub fn is_timeout(&self) -> bool {
        let failures = self.failures();
        !failures.is_empty() && failures.iter().all(|f| f.code == Code::DeadlineExceeded)
    }

    /// The status code of the first rejecting tag, if any.
    pub fn status_code(&self) -> Option<Code> {
        self.failures().first().map(|f| f.code)
    }

    /// A short message suitable for a diagnostic log field.
    pub fn status_message(&self) -> String {
        match self.failures() {
            [] => self.to_string(),
            [only] => only.message.clone(),
            many => render_failures(many),
        }
    }
}
