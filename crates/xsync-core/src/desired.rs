// ── Desired-state mapping ──
//
// Turns feed client entries into per-group-kind user sets and locates the
// state store that belongs to each kind.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use xsync_api::{FeedClientEntry, GroupKind};

use crate::config::UserDefaults;
use crate::model::{User, UserMap, VISION_FLOW};

/// Build the desired set for one inbound group kind.
///
/// Entries with a blank id or email are skipped. The email becomes the user
/// ID; the first entry wins when an email repeats. `reality` users are vless
/// users with the Vision flow; plain vless users get the default flow.
pub fn desired_users(
    kind: GroupKind,
    clients: &[FeedClientEntry],
    defaults: &UserDefaults,
) -> UserMap {
    let mut users = UserMap::new();
    let mut skipped = 0usize;
    let mut duplicates = 0usize;

    for entry in clients {
        let email = entry.email.trim();
        let secret = entry.id.trim();
        if email.is_empty() || secret.is_empty() {
            skipped += 1;
            continue;
        }
        if users.contains_key(email) {
            duplicates += 1;
            continue;
        }
        let user = match kind {
            GroupKind::Vless => User::vless(email, secret, defaults.level, defaults.flow.as_str()),
            GroupKind::Reality => User::vless(email, secret, defaults.level, VISION_FLOW),
            GroupKind::Vmess => User::vmess(email, secret, defaults.level),
        };
        users.insert(user.id.clone(), user);
    }

    if skipped > 0 {
        debug!(%kind, skipped, "skipped feed entries with blank id or email");
    }
    if duplicates > 0 {
        warn!(%kind, duplicates, "feed lists the same email more than once; kept the first");
    }
    users
}

/// State store path for `kind`, derived from the configured base path:
/// `users.json` or `users` both become `users.<kind>.json`.
pub fn store_path(db: &Path, kind: GroupKind) -> PathBuf {
    let base = if db.extension().is_some_and(|e| e == "json") {
        db.with_extension("")
    } else {
        db.to_path_buf()
    };
    let name = base
        .file_name()
        .map_or_else(|| "users".into(), |n| n.to_string_lossy().into_owned());
    base.with_file_name(format!("{name}.{}.json", kind.as_str()))
}
