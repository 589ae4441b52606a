//! Reconciliation core for xsync.
//!
//! Keeps the user directory of a running Xray server consistent with a
//! desired-state feed:
//!
//! - **[`Plan`]**: diffs a desired user set against the applied set into
//!   disjoint add / update / delete jobs, under a [`SyncMode`] and an
//!   optional reseed.
//!
//! - **[`Reconciler`]**: drains jobs through a bounded queue with a fixed
//!   worker pool, retrying each control-plane leg with [`RetryPolicy`] and
//!   settling "already exists" / "not found" with [`IdempotencyPolicy`].
//!   [`reconcile`] wraps load, plan, dial, execute and one atomic save.
//!
//! - **[`JsonStore`]**: the durable applied set, written via temp file and
//!   rename. **[`SnapshotArchiver`]** keeps every raw feed payload.
//!
//! - **[`Syncer`]**: one feed run (or a periodic loop) across the vless,
//!   vmess and reality inbound groups.
//!
//! - **[`ControlPlane`]**: the seam the engine drives; implemented for
//!   [`xsync_api::XrayClient`].

pub mod bulk;
pub mod config;
pub mod control_plane;
pub mod desired;
pub mod engine;
pub mod error;
pub mod model;
pub mod ops;
pub mod plan;
pub mod policy;
pub mod retry;
pub mod snapshot;
pub mod store;
pub mod summary;
pub mod syncer;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bulk::{BulkImport, RejectedRow, parse_csv, read_csv_file};
pub use config::{FeedConfig, StorageConfig, SyncConfig, UserDefaults, XrayConfig};
pub use control_plane::ControlPlane;
pub use desired::{desired_users, store_path};
pub use engine::{Reconciler, reconcile};
pub use error::CoreError;
pub use model::{Protocol, User, UserMap, VISION_FLOW};
pub use ops::OpPolicy;
pub use plan::{Change, Job, Plan, SyncMode};
pub use policy::{IdempotencyPolicy, Settled};
pub use retry::RetryPolicy;
pub use snapshot::{Archived, SnapshotArchiver};
pub use store::{JsonStore, StoreChange};
pub use summary::{Outcome, Summary};
pub use syncer::{KindReport, RunReport, Syncer};
