// ── Feed-driven sync runs ──
//
// One run: fetch the feed, archive its raw bytes, then reconcile every
// inbound group kind that has tags against its own state store. A dial
// failure in one kind is reported and the other kinds still run.

use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use xsync_api::{FeedClient, FeedResponse, GroupKind, TransportConfig, XrayClient};

use crate::config::{FeedConfig, StorageConfig, SyncConfig, UserDefaults, XrayConfig};
use crate::desired::{desired_users, store_path};
use crate::engine::reconcile;
use crate::error::CoreError;
use crate::snapshot::SnapshotArchiver;
use crate::store::JsonStore;
use crate::summary::Summary;

/// Outcome of reconciling one inbound group kind.
#[derive(Debug, Clone, Serialize)]
pub struct KindReport {
    pub kind: String,
    pub tags: Vec<String>,
    pub desired: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one feed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Revision recorded by the snapshot archiver, if archiving succeeded.
    pub revision: Option<i64>,
    pub kinds: Vec<KindReport>,
}

impl RunReport {
    /// All kinds' counters folded together.
    pub fn total(&self) -> Summary {
        let mut total = Summary::default();
        for summary in self.kinds.iter().filter_map(|k| k.summary.as_ref()) {
            total.merge(summary);
        }
        total
    }

    /// Some job failed, or some kind could not run at all.
    pub fn is_degraded(&self) -> bool {
        self.total().is_degraded() || self.kinds.iter().any(|k| k.error.is_some())
    }
}

/// Runs feed-driven reconciliation, once or on a fixed tick.
pub struct Syncer {
    feed: FeedClient,
    xray: XrayConfig,
    sync: SyncConfig,
    storage: StorageConfig,
    defaults: UserDefaults,
}

impl Syncer {
    pub fn new(
        feed: &FeedConfig,
        xray: XrayConfig,
        sync: SyncConfig,
        storage: StorageConfig,
        defaults: UserDefaults,
    ) -> Result<Self, CoreError> {
        let client = FeedClient::new(
            feed.url.clone(),
            feed.token.clone(),
            feed.server_id.clone(),
            &TransportConfig::with_timeout(feed.timeout),
        )?;
        Ok(Self::with_feed_client(client, xray, sync, storage, defaults))
    }

    pub fn with_feed_client(
        feed: FeedClient,
        xray: XrayConfig,
        sync: SyncConfig,
        storage: StorageConfig,
        defaults: UserDefaults,
    ) -> Self {
        Self {
            feed,
            xray,
            sync,
            storage,
            defaults,
        }
    }

    /// Fetch the feed and reconcile every group kind once.
    ///
    /// Only a failed fetch is an error; per-kind problems are in the report.
    pub async fn run_once(&self) -> Result<RunReport, CoreError> {
        let response = self.feed.fetch().await?;
        Ok(self.apply(&response).await)
    }

    /// Reconcile an already-fetched feed response.
    pub async fn apply(&self, response: &FeedResponse) -> RunReport {
        let archiver = SnapshotArchiver::new(&self.storage.snapshots);
        let revision = match archiver.archive(&response.raw) {
            Ok(archived) => Some(archived.revision),
            Err(e) => {
                warn!(error = %e, "failed to archive feed payload");
                None
            }
        };

        let mut report = RunReport {
            revision,
            kinds: Vec::new(),
        };

        if response.groups.is_empty() {
            info!("feed lists no inbound tags; nothing to do");
            return report;
        }

        for kind in GroupKind::ALL {
            let tags = response.groups.get(kind);
            if tags.is_empty() {
                info!(%kind, "no tags for group kind; skipping");
                continue;
            }
            report
                .kinds
                .push(self.reconcile_kind(kind, tags, response).await);
        }

        report
    }

    /// Repeat `run_once` every `interval` until `shutdown` fires.
    ///
    /// A failed fetch is logged and retried on the next tick. Returns the
    /// report of the last run that got past the fetch.
    pub async fn run_every(&self, interval: Duration, shutdown: CancellationToken) -> RunReport {
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last = RunReport::default();

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = tick.tick() => {
                    match self.run_once().await {
                        Ok(report) => last = report,
                        Err(e) => error!(error = %e, "feed run failed; retrying next tick"),
                    }
                }
            }
        }

        info!("sync loop stopped");
        last
    }

    async fn reconcile_kind(
        &self,
        kind: GroupKind,
        tags: &[String],
        response: &FeedResponse,
    ) -> KindReport {
        let desired = desired_users(kind, &response.clients, &self.defaults);
        let mut report = KindReport {
            kind: kind.to_string(),
            tags: tags.to_vec(),
            desired: desired.len(),
            summary: None,
            error: None,
        };

        let path = store_path(&self.storage.db, kind);
        let store = match JsonStore::open(&path) {
            Ok(store) => store,
            Err(e) => {
                error!(%kind, error = %e, "cannot open state store");
                report.error = Some(e.to_string());
                return report;
            }
        };

        let transport = TransportConfig::with_timeout(self.xray.timeout);
        let connect = || XrayClient::connect(&self.xray.address, tags.to_vec(), &transport);

        match reconcile(&store, &desired, &self.sync, connect).await {
            Ok(summary) => report.summary = Some(summary),
            Err(e) => {
                error!(%kind, ?tags, error = %e, "reconciliation aborted");
                report.error = Some(e.to_string());
            }
        }
        report
    }
}
