// ── Snapshot archiver ──
//
// Keeps an audit trail of every desired-state payload: the exact bytes go
// to `snapshot-<UTC timestamp>.json`, and `current.json` holds the latest
// payload wrapped as `{ "revision": n, "payload": ... }`. Revisions are Unix
// seconds, bumped past the previous revision when runs land in the same
// second.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::CoreError;
use crate::store::{tmp_path, write_synced};

const CURRENT_FILE: &str = "current.json";

#[derive(Serialize, Deserialize)]
struct Current {
    revision: i64,
    payload: Value,
}

/// Where a payload was archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archived {
    pub revision: i64,
    pub snapshot: PathBuf,
}

/// Writes raw feed payloads into a snapshot directory.
#[derive(Debug, Clone)]
pub struct SnapshotArchiver {
    dir: PathBuf,
}

impl SnapshotArchiver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn current_path(&self) -> PathBuf {
        self.dir.join(CURRENT_FILE)
    }

    /// Archive `raw` stamped with the current time.
    pub fn archive(&self, raw: &[u8]) -> Result<Archived, CoreError> {
        self.archive_at(raw, Utc::now())
    }

    /// Archive `raw` stamped with `now`.
    ///
    /// The payload is embedded in `current.json` as JSON when it parses,
    /// otherwise as a string. The timestamped file always gets the raw bytes.
    pub fn archive_at(&self, raw: &[u8], now: DateTime<Utc>) -> Result<Archived, CoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| CoreError::snapshot(&self.dir, e))?;

        let revision = now.timestamp().max(self.previous_revision() + 1);

        let snapshot = self.free_snapshot_path(now);
        write_synced(&snapshot, raw).map_err(|e| CoreError::snapshot(&snapshot, e))?;

        let payload = serde_json::from_slice(raw)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(raw).into_owned()));
        let body = serde_json::to_vec_pretty(&Current { revision, payload })
            .map_err(|e| CoreError::snapshot(&self.current_path(), e))?;

        let current = self.current_path();
        let tmp = tmp_path(&current);
        write_synced(&tmp, &body).map_err(|e| CoreError::snapshot(&tmp, e))?;
        fs::rename(&tmp, &current).map_err(|e| CoreError::snapshot(&current, e))?;

        debug!(revision, snapshot = %snapshot.display(), "archived feed payload");
        Ok(Archived { revision, snapshot })
    }

    /// Revision recorded in `current.json`, or 0 if absent or unreadable.
    pub fn previous_revision(&self) -> i64 {
        fs::read(self.current_path())
            .ok()
            .and_then(|bytes| serde_json::from_slice::<Current>(&bytes).ok())
            .map_or(0, |c| c.revision)
    }

    fn free_snapshot_path(&self, now: DateTime<Utc>) -> PathBuf {
        let stamp = now.format("%Y%m%dT%H%M%SZ");
        let first = self.dir.join(format!("snapshot-{stamp}.json"));
        if !first.exists() {
            return first;
        }
        (1u32..)
            .map(|n| self.dir.join(format!("snapshot-{stamp}-{n}.json")))
            .find(|p| !p.exists())
            .unwrap_or(first)
    }
}
