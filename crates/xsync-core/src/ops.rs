// ── Single-user operations ──
//
// One fan-out call with the retry policy, settled by the idempotency policy,
// and written through to a state store when one is given so the next
// reconciliation run sees the change.

use tracing::{info, warn};

use crate::control_plane::ControlPlane;
use crate::error::CoreError;
use crate::model::User;
use crate::policy::{IdempotencyPolicy, Settled};
use crate::retry::RetryPolicy;
use crate::store::JsonStore;
use crate::summary::Outcome;

/// Retry and idempotency settings for single operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpPolicy {
    pub retry: RetryPolicy,
    pub idempotency: IdempotencyPolicy,
}

/// Add one user to every target inbound.
///
/// Returns `Added` or `SkippedIdempotentAdd`; a failure (including "already
/// exists" under the `fail` policy) is returned as an error.
pub async fn add_user<P: ControlPlane + ?Sized>(
    plane: &P,
    user: &User,
    policy: OpPolicy,
    store: Option<&JsonStore>,
) -> Result<Outcome, CoreError> {
    let result = policy
        .retry
        .execute(
            "add-user",
            || plane.add_user(user),
            |e: &xsync_api::Error| !e.is_already_exists(),
        )
        .await;

    let outcome = match policy.idempotency.settle_add(result) {
        Settled::Done => Outcome::Added,
        Settled::Skipped => Outcome::SkippedIdempotentAdd,
        Settled::Failed(e) => return Err(e.into()),
    };

    info!(id = %user.id, protocol = %user.protocol, tags = ?plane.targets(), ?outcome, "add-user");
    if let Some(store) = store {
        store.upsert(user.clone())?;
    }
    Ok(outcome)
}

/// Remove one user (by ID) from every target inbound.
///
/// Returns `Removed` or `SkippedIdempotentDelete`.
pub async fn remove_user<P: ControlPlane + ?Sized>(
    plane: &P,
    id: &str,
    policy: OpPolicy,
    store: Option<&JsonStore>,
) -> Result<Outcome, CoreError> {
    let result = policy
        .retry
        .execute(
            "remove-user",
            || plane.remove_user(id),
            |e: &xsync_api::Error| !e.is_not_found(),
        )
        .await;

    let outcome = match policy.idempotency.settle_remove(result) {
        Settled::Done => Outcome::Removed,
        Settled::Skipped => Outcome::SkippedIdempotentDelete,
        Settled::Failed(e) => return Err(e.into()),
    };

    info!(id, tags = ?plane.targets(), ?outcome, "remove-user");
    if let Some(store) = store {
        if !store.delete(id)? {
            warn!(id, store = %store.path().display(), "user was not in the state store");
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use xsync_api::{Code, Error as ApiError, RpcOp};

    use super::*;

    struct FixedPlane {
        targets: Vec<String>,
        add: Mutex<Vec<Result<(), ApiError>>>,
        remove: Mutex<Vec<Result<(), ApiError>>>,
    }

    impl FixedPlane {
        fn new(add: Vec<Result<(), ApiError>>, remove: Vec<Result<(), ApiError>>) -> Self {
            Self {
                targets: vec!["in".into()],
                add: Mutex::new(add),
                remove: Mutex::new(remove),
            }
        }

        fn next(queue: &Mutex<Vec<Result<(), ApiError>>>) -> Result<(), ApiError> {
            let mut queue = queue.lock().expect("lock");
            if queue.is_empty() { Ok(()) } else { queue.remove(0) }
        }
    }

    #[async_trait]
    impl ControlPlane for FixedPlane {
        async fn add_user(&self, _user: &User) -> Result<(), ApiError> {
            Self::next(&self.add)
        }

        async fn remove_user(&self, _id: &str) -> Result<(), ApiError> {
            Self::next(&self.remove)
        }

        fn targets(&self) -> &[String] {
            &self.targets
        }
    }

    fn policy(idempotency: IdempotencyPolicy) -> OpPolicy {
        OpPolicy {
            retry: RetryPolicy::new(3, Duration::ZERO),
            idempotency,
        }
    }

    fn exists() -> Result<(), ApiError> {
        Err(ApiError::rejected(RpcOp::AddUser, "in", Code::AlreadyExists, "exists"))
    }

    fn missing() -> Result<(), ApiError> {
        Err(ApiError::rejected(RpcOp::RemoveUser, "in", Code::NotFound, "not found"))
    }

    #[tokio::test]
    async fn add_writes_through_to_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::open(dir.path().join("users.json")).expect("open");
        let user = User::vless("a@x", "u1", 0, "");

        let outcome = add_user(
            &FixedPlane::new(vec![], vec![]),
            &user,
            policy(IdempotencyPolicy::Skip),
            Some(&store),
        )
        .await
        .expect("add");

        assert_eq!(outcome, Outcome::Added);
        assert_eq!(store.load().expect("load").get("a@x"), Some(&user));
    }

    #[tokio::test]
    async fn add_of_existing_user_follows_policy() {
        let user = User::vless("a@x", "u1", 0, "");

        let skipped = add_user(
            &FixedPlane::new(vec![exists()], vec![]),
            &user,
            policy(IdempotencyPolicy::Skip),
            None,
        )
        .await
        .expect("skip");
        assert_eq!(skipped, Outcome::SkippedIdempotentAdd);

        let err = add_user(
            &FixedPlane::new(vec![exists()], vec![]),
            &user,
            policy(IdempotencyPolicy::Fail),
            None,
        )
        .await
        .expect_err("strict");
        assert!(matches!(err, CoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn remove_of_missing_user_is_skipped_and_dropped_from_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::open(dir.path().join("users.json")).expect("open");
        store.upsert(User::vmess("a@x", "u1", 0)).expect("seed");

        let outcome = remove_user(
            &FixedPlane::new(vec![], vec![missing()]),
            "a@x",
            policy(IdempotencyPolicy::Skip),
            Some(&store),
        )
        .await
        .expect("remove");

        assert_eq!(outcome, Outcome::SkippedIdempotentDelete);
        assert!(store.load().expect("load").is_empty());
    }

    #[tokio::test]
    async fn persistent_failure_leaves_store_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::open(dir.path().join("users.json")).expect("open");
        let unavailable =
            || Err(ApiError::rejected(RpcOp::AddUser, "in", Code::Unavailable, "down"));

        let err = add_user(
            &FixedPlane::new(vec![unavailable(), unavailable(), unavailable()], vec![]),
            &User::vless("a@x", "u1", 0, ""),
            policy(IdempotencyPolicy::Skip),
            Some(&store),
        )
        .await
        .expect_err("down");

        assert!(matches!(err, CoreError::Rejected { .. }));
        assert!(store.load().expect("load").is_empty());
    }
}
