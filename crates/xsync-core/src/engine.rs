// ── Reconciliation engine ──
//
// Executes a `Plan` against a `ControlPlane` with a fixed worker pool.
// Jobs flow through a bounded queue; each worker drains it until the
// producer closes it. Outcomes land in atomic counters and successful jobs
// mutate a working copy of the applied set under one lock. The working copy
// is handed back once the pool has drained so the caller can persist it in
// one atomic write.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use xsync_api::Error as ApiError;

use crate::config::SyncConfig;
use crate::control_plane::ControlPlane;
use crate::error::CoreError;
use crate::model::{User, UserMap};
use crate::plan::{Change, Job, Plan};
use crate::policy::Settled;
use crate::store::{JsonStore, StoreChange};
use crate::summary::{Counters, Outcome, Summary};

/// Worker-pool executor bound to one control plane.
pub struct Reconciler<P> {
    plane: Arc<P>,
    config: SyncConfig,
    write_through: Option<Arc<JsonStore>>,
}

impl<P: ControlPlane + 'static> Reconciler<P> {
    pub fn new(plane: P, config: SyncConfig) -> Self {
        Self::shared(Arc::new(plane), config)
    }

    pub fn shared(plane: Arc<P>, config: SyncConfig) -> Self {
        Self {
            plane,
            config,
            write_through: None,
        }
    }

    /// Persist applied-set mutations to `store` while the pool runs, in
    /// addition to returning the working copy.
    ///
    /// A single writer task drains the mutations queued since its last write
    /// and applies them as one batch, so a large run costs far fewer file
    /// rewrites than jobs. Everything queued is written before `execute`
    /// returns.
    pub fn with_write_through(mut self, store: Arc<JsonStore>) -> Self {
        self.write_through = Some(store);
        self
    }

    /// Run every job in `plan`, starting from a copy of `applied`.
    ///
    /// Never fails as a whole: per-job failures are counted and logged.
    /// Returns the counters and the resulting applied set.
    pub async fn execute(&self, plan: Plan, applied: &UserMap) -> (Summary, UserMap) {
        let total = u64::try_from(plan.len()).unwrap_or(u64::MAX);
        let workers = self.config.concurrency.max(1);

        let flushed = CancellationToken::new();
        let (write_through, writer) = match &self.write_through {
            Some(store) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let writer = tokio::spawn(store_writer(Arc::clone(store), rx, flushed.clone()));
                (Some(tx), Some(writer))
            }
            None => (None, None),
        };

        let shared = Arc::new(Shared {
            plane: Arc::clone(&self.plane),
            config: self.config.clone(),
            state: Mutex::new(applied.clone()),
            counters: Counters::default(),
            write_through,
            total,
        });

        let cancel = CancellationToken::new();
        let progress = (total > 0 && !self.config.progress_interval.is_zero()).then(|| {
            tokio::spawn(progress_task(
                Arc::clone(&shared),
                self.config.progress_interval,
                cancel.clone(),
            ))
        });

        let (tx, rx) = mpsc::channel::<Job>(workers * 2);
        let rx = Arc::new(Mutex::new(rx));
        let mut pool = JoinSet::new();
        for worker_id in 0..workers {
            pool.spawn(worker(worker_id, Arc::clone(&shared), Arc::clone(&rx)));
        }

        for job in plan.into_jobs() {
            if tx.send(job).await.is_err() {
                warn!("all workers exited early; remaining jobs dropped");
                break;
            }
        }
        drop(tx);

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "worker task aborted");
            }
        }

        cancel.cancel();
        if let Some(handle) = progress {
            let _ = handle.await;
        }
        flushed.cancel();
        if let Some(handle) = writer {
            if let Err(e) = handle.await {
                warn!(error = %e, "state store writer aborted");
            }
        }

        let summary = shared.counters.snapshot();
        let state = match Arc::try_unwrap(shared) {
            Ok(shared) => shared.state.into_inner(),
            Err(shared) => shared.state.lock().await.clone(),
        };
        (summary, state)
    }

    /// Add every user through the pool, e.g. for a bulk import.
    ///
    /// Users already present on the control plane are settled by the
    /// idempotency policy. Returns the counters and the users that ended up
    /// applied.
    pub async fn add_all(&self, users: Vec<User>) -> (Summary, UserMap) {
        let plan = Plan {
            adds: users,
            ..Plan::default()
        };
        self.execute(plan, &UserMap::new()).await
    }
}

/// Full reconciliation of one store against a desired set.
///
/// Loads the applied set, logs the plan, dials the control plane (a dial
/// failure aborts before any job runs), executes, then writes the working
/// copy back to the store in one atomic replace.
pub async fn reconcile<P, C, Fut>(
    store: &JsonStore,
    desired: &UserMap,
    config: &SyncConfig,
    connect: C,
) -> Result<Summary, CoreError>
where
    P: ControlPlane + 'static,
    C: FnOnce() -> Fut,
    Fut: Future<Output = Result<P, ApiError>>,
{
    let applied = store.load()?;
    let plan = Plan::compute(&applied, desired, config.mode, config.reseed);

    info!(
        store = %store.path().display(),
        desired = desired.len(),
        applied = applied.len(),
        add = plan.adds.len(),
        update = plan.updates.len(),
        delete = plan.deletes.len(),
        mode = %config.mode,
        reseed = config.reseed,
        "plan"
    );

    let plane = connect().await?;
    let reconciler = Reconciler::new(plane, config.clone());
    let (summary, state) = reconciler.execute(plan, &applied).await;

    summary.log(&store.path().display().to_string());
    store.save(&state)?;
    Ok(summary)
}

// ── Workers ──────────────────────────────────────────────────────────

struct Shared<P> {
    plane: Arc<P>,
    config: SyncConfig,
    state: Mutex<UserMap>,
    counters: Counters,
    write_through: Option<mpsc::UnboundedSender<StoreChange>>,
    total: u64,
}

async fn worker<P: ControlPlane>(
    worker_id: usize,
    shared: Arc<Shared<P>>,
    rx: Arc<Mutex<mpsc::Receiver<Job>>>,
) {
    loop {
        let next = rx.lock().await.recv().await;
        let Some(job) = next else { break };
        debug!(worker_id, op = job.op(), id = job.id(), "job");

        let outcome = shared.run(job).await;
        let processed = shared.counters.record(outcome);

        let every = shared.config.progress_every;
        if every > 0 && processed % every == 0 && processed < shared.total {
            shared.counters.log_progress(shared.total);
        }
    }
    debug!(worker_id, "worker done");
}

async fn progress_task<P>(shared: Arc<Shared<P>>, every: Duration, cancel: CancellationToken) {
    let mut tick = tokio::time::interval(every);
    tick.tick().await; // immediate first tick
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = tick.tick() => shared.counters.log_progress(shared.total),
        }
    }
}

impl<P: ControlPlane> Shared<P> {
    async fn run(&self, job: Job) -> Outcome {
        match job {
            Job::Add(user) => self.add(user).await,
            Job::Update(change) => self.update(change).await,
            Job::Delete(user) => self.delete(user).await,
        }
    }

    async fn add(&self, user: User) -> Outcome {
        let result = self.add_leg(&user).await;
        match self.config.idempotency.settle_add(result) {
            Settled::Done => {
                self.commit_set(user).await;
                Outcome::Added
            }
            Settled::Skipped => {
                self.commit_set(user).await;
                Outcome::SkippedIdempotentAdd
            }
            Settled::Failed(e) => {
                self.report_failure("add", &user, &e);
                Outcome::Failed
            }
        }
    }

    async fn delete(&self, user: User) -> Outcome {
        let result = self.remove_leg(&user.id).await;
        match self.config.idempotency.settle_remove(result) {
            Settled::Done => {
                self.commit_remove(&user.id).await;
                Outcome::Removed
            }
            Settled::Skipped => {
                self.commit_remove(&user.id).await;
                Outcome::SkippedIdempotentDelete
            }
            Settled::Failed(e) => {
                self.report_failure("delete", &user, &e);
                Outcome::Failed
            }
        }
    }

    /// Remove the old record, then add the new one.
    ///
    /// "Not found" on the remove leg means the old record is already gone
    /// and the add proceeds. If the add leg fails, the old record is re-added
    /// once; the applied set keeps it only if that rollback succeeds.
    async fn update(&self, change: Change) -> Outcome {
        let Change { old, new } = change;

        if let Err(e) = self.remove_leg(&old.id).await {
            if !e.is_not_found() {
                self.report_failure("update", &new, &e);
                return Outcome::Failed;
            }
            debug!(id = %old.id, "old record already absent");
        }

        let result = self.add_leg(&new).await;
        match self.config.idempotency.settle_add(result) {
            Settled::Done | Settled::Skipped => {
                self.commit_set(new).await;
                Outcome::Updated
            }
            Settled::Failed(e) => {
                self.report_failure("update", &new, &e);
                self.rollback(old).await;
                Outcome::Failed
            }
        }
    }

    async fn rollback(&self, old: User) {
        match self.plane.add_user(&old).await {
            Ok(()) => debug!(id = %old.id, "update rolled back to old record"),
            Err(e) if e.is_already_exists() => {
                debug!(id = %old.id, "old record still present");
            }
            Err(e) => {
                warn!(
                    id = %old.id,
                    error = %e,
                    "rollback failed; user is absent from the control plane"
                );
                self.commit_remove(&old.id).await;
            }
        }
    }

    // ── RPC legs ─────────────────────────────────────────────────────

    async fn add_leg(&self, user: &User) -> Result<(), ApiError> {
        self.config
            .retry
            .execute(
                "add-user",
                || self.plane.add_user(user),
                |e: &ApiError| !e.is_already_exists(),
            )
            .await
    }

    async fn remove_leg(&self, id: &str) -> Result<(), ApiError> {
        self.config
            .retry
            .execute(
                "remove-user",
                || self.plane.remove_user(id),
                |e: &ApiError| !e.is_not_found(),
            )
            .await
    }

    // ── Working copy ─────────────────────────────────────────────────

    async fn commit_set(&self, user: User) {
        self.queue_write(StoreChange::Upsert(user.clone()));
        self.state.lock().await.insert(user.id.clone(), user);
    }

    async fn commit_remove(&self, id: &str) {
        self.queue_write(StoreChange::Delete(id.to_owned()));
        self.state.lock().await.remove(id);
    }

    fn queue_write(&self, change: StoreChange) {
        if let Some(tx) = &self.write_through {
            if tx.send(change).is_err() {
                warn!("state store writer is gone; change not persisted");
            }
        }
    }

    fn report_failure(&self, op: &str, user: &User, error: &ApiError) {
        warn!(
            op,
            protocol = %user.protocol,
            id = %user.id,
            uuid = %user.secret_id,
            flow = user.effective_flow(),
            tags = ?self.plane.targets(),
            code = %status_code_name(error),
            error = %error.status_message(),
            "job failed"
        );
    }
}

fn status_code_name(error: &ApiError) -> String {
    error
        .status_code()
        .map_or_else(|| "Unknown".to_owned(), |c| format!("{c:?}"))
}

/// Drain queued changes into `store`, one `apply` per batch, until
/// `flushed` fires and the queue is empty. Failures are logged, never fatal.
async fn store_writer(
    store: Arc<JsonStore>,
    mut rx: mpsc::UnboundedReceiver<StoreChange>,
    flushed: CancellationToken,
) {
    loop {
        let mut batch = Vec::new();
        tokio::select! {
            biased;
            Some(change) = rx.recv() => batch.push(change),
            () = flushed.cancelled() => {}
        }
        while let Ok(change) = rx.try_recv() {
            batch.push(change);
        }
        if batch.is_empty() {
            break;
        }

        let changes = batch.len();
        let store = Arc::clone(&store);
        match tokio::task::spawn_blocking(move || store.apply(batch)).await {
            Ok(Ok(())) => debug!(changes, "wrote through to state store"),
            Ok(Err(e)) => warn!(error = %e, changes, "write-through to state store failed"),
            Err(e) => warn!(error = %e, "write-through task aborted"),
        }
    }
}
