// ── Run summary ──
//
// Per-outcome counters. Workers bump lock-free atomics; the final value is
// copied out into a plain `Summary` once the pool has drained.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::info;

/// How a single job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Added,
    Updated,
    Removed,
    Failed,
    SkippedIdempotentAdd,
    SkippedIdempotentDelete,
}

/// Outcome counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub added: u64,
    pub updated: u64,
    pub removed: u64,
    pub failed: u64,
    pub skipped_idempotent_add: u64,
    pub skipped_idempotent_delete: u64,
}

impl Summary {
    /// Jobs accounted for.
    pub fn total(&self) -> u64 {
        self.added
            + self.updated
            + self.removed
            + self.failed
            + self.skipped_idempotent_add
            + self.skipped_idempotent_delete
    }

    /// At least one job failed.
    pub fn is_degraded(&self) -> bool {
        self.failed > 0
    }

    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Added => self.added += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Removed => self.removed += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::SkippedIdempotentAdd => self.skipped_idempotent_add += 1,
            Outcome::SkippedIdempotentDelete => self.skipped_idempotent_delete += 1,
        }
    }

    /// Fold another run's counters into this one.
    pub fn merge(&mut self, other: &Summary) {
        self.added += other.added;
        self.updated += other.updated;
        self.removed += other.removed;
        self.failed += other.failed;
        self.skipped_idempotent_add += other.skipped_idempotent_add;
        self.skipped_idempotent_delete += other.skipped_idempotent_delete;
    }

    pub(crate) fn log(&self, scope: &str) {
        info!(
            scope,
            added = self.added,
            updated = self.updated,
            removed = self.removed,
            failed = self.failed,
            skipped_add = self.skipped_idempotent_add,
            skipped_delete = self.skipped_idempotent_delete,
            "sync summary"
        );
    }
}

/// Shared counters bumped by workers.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    processed: AtomicU64,
    added: AtomicU64,
    updated: AtomicU64,
    removed: AtomicU64,
    failed: AtomicU64,
    skipped_add: AtomicU64,
    skipped_delete: AtomicU64,
}

impl Counters {
    /// Record a finished job; returns the number of jobs processed so far.
    pub(crate) fn record(&self, outcome: Outcome) -> u64 {
        let slot = match outcome {
            Outcome::Added => &self.added,
            Outcome::Updated => &self.updated,
            Outcome::Removed => &self.removed,
            Outcome::Failed => &self.failed,
            Outcome::SkippedIdempotentAdd => &self.skipped_add,
            Outcome::SkippedIdempotentDelete => &self.skipped_delete,
        };
        slot.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn snapshot(&self) -> Summary {
        Summary {
            added: self.added.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped_idempotent_add: self.skipped_add.load(Ordering::Relaxed),
            skipped_idempotent_delete: self.skipped_delete.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn log_progress(&self, total: u64) {
        let processed = self.processed.load(Ordering::Relaxed);
        let s = self.snapshot();
        info!(
            processed,
            total,
            percent = processed.saturating_mul(100).checked_div(total).unwrap_or(100),
            added = s.added,
            updated = s.updated,
            removed = s.removed,
            failed = s.failed,
            skipped = s.skipped_idempotent_add + s.skipped_idempotent_delete,
            "progress"
        );
    }
}
