// ── Idempotency policy ──
//
// "Already exists" on add and "not found" on remove mean the control plane
// is already in the requested end state. The policy decides whether such a
// result is skipped, counted as a success, or surfaced as a failure.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use xsync_api::Error as ApiError;

/// Disposition of idempotency signals from the control plane.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum IdempotencyPolicy {
    /// Count separately; still converge the applied set.
    #[default]
    Skip,
    /// Count as if the call succeeded.
    Success,
    /// Count as a failure.
    Fail,
}

/// A control-plane leg after idempotency classification.
#[derive(Debug)]
pub enum Settled {
    /// The call succeeded, or was benign under `success`.
    Done,
    /// The call was benign under `skip`.
    Skipped,
    /// A real failure, or a benign one under `fail`.
    Failed(ApiError),
}

impl IdempotencyPolicy {
    /// Settle an add leg: "already exists" is the benign signal.
    pub fn settle_add(self, result: Result<(), ApiError>) -> Settled {
        self.settle(result, ApiError::is_already_exists)
    }

    /// Settle a remove leg: "not found" is the benign signal.
    pub fn settle_remove(self, result: Result<(), ApiError>) -> Settled {
        self.settle(result, ApiError::is_not_found)
    }

    fn settle(self, result: Result<(), ApiError>, benign: fn(&ApiError) -> bool) -> Settled {
        match result {
            Ok(()) => Settled::Done,
            Err(e) if benign(&e) => match self {
                IdempotencyPolicy::Skip => Settled::Skipped,
                IdempotencyPolicy::Success => Settled::Done,
                IdempotencyPolicy::Fail => Settled::Failed(e),
            },
            Err(e) => Settled::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use xsync_api::{Code, RpcOp};

    use super::*;

    fn exists() -> Result<(), ApiError> {
        Err(ApiError::rejected(
            RpcOp::AddUser,
            "in",
            Code::Unknown,
            "User a@b already exists.",
        ))
    }

    fn missing() -> Result<(), ApiError> {
        Err(ApiError::rejected(
            RpcOp::RemoveUser,
            "in",
            Code::Unknown,
            "User a@b not found.",
        ))
    }

    #[test]
    fn parses_from_cli_strings() {
        assert_eq!(IdempotencyPolicy::from_str("Skip").ok(), Some(IdempotencyPolicy::Skip));
        assert_eq!(IdempotencyPolicy::from_str("fail").ok(), Some(IdempotencyPolicy::Fail));
        assert!(IdempotencyPolicy::from_str("ignore").is_err());
    }

    #[test]
    fn skip_policy_skips_benign_results() {
        assert!(matches!(IdempotencyPolicy::Skip.settle_add(exists()), Settled::Skipped));
        assert!(matches!(IdempotencyPolicy::Skip.settle_remove(missing()), Settled::Skipped));
    }

    #[test]
    fn success_policy_counts_benign_as_done() {
        assert!(matches!(IdempotencyPolicy::Success.settle_add(exists()), Settled::Done));
    }

    #[test]
    fn fail_policy_surfaces_benign_results() {
        assert!(matches!(IdempotencyPolicy::Fail.settle_remove(missing()), Settled::Failed(_)));
    }

    #[test]
    fn signals_are_operation_specific() {
        // "not found" on an add is a real failure
        assert!(matches!(IdempotencyPolicy::Skip.settle_add(missing()), Settled::Failed(_)));
        assert!(matches!(IdempotencyPolicy::Skip.settle_remove(exists()), Settled::Failed(_)));
    }
}
