// ── State store ──
//
// A JSON file holding the applied user set: `{ "users": { id: record } }`.
// Every write goes to `<path>.tmp` first and is renamed over the live file,
// so a crash never leaves a truncated store behind.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;
use crate::model::{User, UserMap};

/// One incremental mutation, for [`JsonStore::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Upsert(User),
    Delete(String),
}

#[derive(Debug, Default, Deserialize)]
struct StoreFile {
    #[serde(default)]
    users: UserMap,
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    users: &'a UserMap,
}

/// File-backed applied-state store.
///
/// `load`/`save` serve the reconciliation engine's replace-all discipline;
/// `upsert`/`delete`/`apply` serve callers that want per-operation
/// durability. Every write rewrites the whole file, so incremental callers
/// with many changes should batch them through `apply`. All of them
/// serialize through one lock so mixed callers never interleave
/// a read-modify-write.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonStore {
    /// Open a store at `path`, creating its parent directory if needed.
    ///
    /// The file itself is not created until the first write; a missing file
    /// loads as an empty set.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CoreError::store(parent, e))?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full applied set.
    ///
    /// A missing or empty file is an empty set. A file that exists but does
    /// not parse is an error: treating it as empty would make the next
    /// replace-mode run forget every user it had applied.
    pub fn load(&self) -> Result<UserMap, CoreError> {
        let _guard = self.guard()?;
        self.read_unlocked()
    }

    /// Atomically replace the whole applied set.
    pub fn save(&self, users: &UserMap) -> Result<(), CoreError> {
        let _guard = self.guard()?;
        self.write_unlocked(users)
    }

    /// Insert or replace a single user.
    pub fn upsert(&self, user: User) -> Result<(), CoreError> {
        let _guard = self.guard()?;
        let mut users = self.read_unlocked()?;
        users.insert(user.id.clone(), user);
        self.write_unlocked(&users)
    }

    /// Remove a single user. Returns whether the ID was present.
    pub fn delete(&self, id: &str) -> Result<bool, CoreError> {
        let _guard = self.guard()?;
        let mut users = self.read_unlocked()?;
        let existed = users.remove(id).is_some();
        if existed {
            self.write_unlocked(&users)?;
        }
        Ok(existed)
    }

    /// Apply a batch of changes with one read and one atomic write.
    ///
    /// Changes apply in order, so a later change to the same ID wins.
    pub fn apply(&self, changes: Vec<StoreChange>) -> Result<(), CoreError> {
        if changes.is_empty() {
            return Ok(());
        }
        let _guard = self.guard()?;
        let mut users = self.read_unlocked()?;
        for change in changes {
            match change {
                StoreChange::Upsert(user) => {
                    users.insert(user.id.clone(), user);
                }
                StoreChange::Delete(id) => {
                    users.remove(&id);
                }
            }
        }
        self.write_unlocked(&users)
    }

    // ── File mechanics ───────────────────────────────────────────────

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>, CoreError> {
        self.lock
            .lock()
            .map_err(|_| CoreError::Internal("state store lock poisoned".into()))
    }

    fn read_unlocked(&self) -> Result<UserMap, CoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(UserMap::new()),
            Err(e) => return Err(CoreError::store(&self.path, e)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(UserMap::new());
        }
        let file: StoreFile = serde_json::from_slice(&bytes)
            .map_err(|e| CoreError::store(&self.path, format!("corrupt state file: {e}")))?;
        debug!(path = %self.path.display(), users = file.users.len(), "loaded state");
        Ok(file.users)
    }

    fn write_unlocked(&self, users: &UserMap) -> Result<(), CoreError> {
        let mut body = serde_json::to_vec_pretty(&StoreFileRef { users })
            .map_err(|e| CoreError::store(&self.path, e))?;
        body.push(b'\n');

        let tmp = tmp_path(&self.path);
        write_synced(&tmp, &body).map_err(|e| CoreError::store(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| CoreError::store(&self.path, e))?;
        debug!(path = %self.path.display(), users = users.len(), "saved state");
        Ok(())
    }
}

pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

pub(crate) fn write_synced(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut f = fs::File::create(path)?;
    f.write_all(body)?;
    f.sync_all()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::User;

    fn open_in(dir: &tempfile::TempDir) -> JsonStore {
        JsonStore::open(dir.path().join("state").join("users.vless.json")).expect("open store")
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_in(&dir);
        assert!(store.load().expect("load").is_empty());
        assert!(dir.path().join("state").is_dir());
    }

    #[test]
    fn save_then_load_returns_same_set() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_in(&dir);
        let mut users = UserMap::new();
        users.insert("a".into(), User::vless("a", "u1", 0, ""));
        users.insert("b".into(), User::vmess("b", "u2", 1));

        store.save(&users).expect("save");

        assert_eq!(store.load().expect("load"), users);
        assert!(!tmp_path(store.path()).exists());
    }

    #[test]
    fn upsert_and_delete_share_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_in(&dir);

        store.upsert(User::vless("a", "u1", 0, "")).expect("upsert a");
        store.upsert(User::vless("b", "u2", 0, "")).expect("upsert b");
        store.upsert(User::vless("a", "u3", 0, "")).expect("replace a");
        assert!(store.delete("b").expect("delete b"));
        assert!(!store.delete("missing").expect("delete missing"));

        let users = store.load().expect("load");
        assert_eq!(users.len(), 1);
        assert_eq!(users["a"].secret_id, "u3");
    }

    #[test]
    fn apply_batches_changes_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_in(&dir);
        store.upsert(User::vless("old", "u0", 0, "")).expect("seed");

        store
            .apply(vec![
                StoreChange::Upsert(User::vless("a", "u1", 0, "")),
                StoreChange::Upsert(User::vmess("b", "u2", 0)),
                StoreChange::Delete("old".into()),
                StoreChange::Upsert(User::vless("a", "u3", 0, "")),
                StoreChange::Delete("never-there".into()),
            ])
            .expect("apply");

        let users = store.load().expect("load");
        let ids: Vec<_> = users.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(users["a"].secret_id, "u3");
    }

    #[test]
    fn empty_batch_does_not_create_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_in(&dir);
        store.apply(Vec::new()).expect("apply");
        assert!(!store.path().exists());
    }

    #[test]
    fn corrupt_file_is_an_error_not_an_empty_set() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_in(&dir);
        fs::write(store.path(), b"{ \"users\": [").expect("write garbage");

        let err = store.load().expect_err("corrupt");
        assert!(matches!(err, CoreError::Store { .. }), "got {err:?}");
    }

    #[test]
    fn whitespace_only_file_loads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_in(&dir);
        fs::write(store.path(), b"\n").expect("write");
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn loads_records_keyed_by_uid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_in(&dir);
        fs::write(
            store.path(),
            br#"{"users":{"a@x":{"uid":"a@x","email":"a@x","uuid":"u1","proto":"vless","level":1,"flow":""}}}"#,
        )
        .expect("write");

        let users = store.load().expect("load");
        assert_eq!(users["a@x"], User::vless("a@x", "u1", 1, ""));

        // rewritten under the current key, still loadable
        store.upsert(User::vmess("b@x", "u2", 0)).expect("upsert");
        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(store.path()).expect("read")).expect("json");
        assert_eq!(raw["users"]["a@x"]["id"], "a@x");
        assert_eq!(store.load().expect("reload").len(), 2);
    }

    #[test]
    fn file_layout_is_a_users_object() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_in(&dir);
        store.upsert(User::vmess("a@x", "u1", 0)).expect("upsert");

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(store.path()).expect("read")).expect("json");
        assert_eq!(raw["users"]["a@x"]["uuid"], "u1");
        assert_eq!(raw["users"]["a@x"]["proto"], "vmess");
    }
}
