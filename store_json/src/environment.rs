//! Data directory setup and the shared write path.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use sanka_store::{Snapshot, StoreError, Tables};
use tracing::{info, warn};

use crate::log::read_log;
use crate::{IntegrityReport, JsonStoreError};

const STATE_FILE: &str = "state.json";
const LOG_FILE: &str = "transactions.jsonl";
const UPLOADS_DIR: &str = "uploads";

/// A store persisted as JSON files under one data directory.
///
/// All access goes through a single mutex, so every trait method is one
/// atomic step with respect to every other.
pub struct JsonFileStore {
    root: PathBuf,
    pub(crate) tables: Mutex<Tables>,
    integrity: IntegrityReport,
}

impl JsonFileStore {
    /// Open (or create) the store at `root` and run the integrity check.
    ///
    /// Cached balances that disagree with the transaction log are repaired
    /// and the repaired state is written back before the store is returned.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, JsonStoreError> {
        let root = root.as_ref().to_path_buf();
        let uploads = root.join(UPLOADS_DIR);
        fs::create_dir_all(&uploads).map_err(|e| JsonStoreError::io(&uploads, e))?;

        let state_path = root.join(STATE_FILE);
        let snapshot = if state_path.exists() {
            let raw = fs::read(&state_path).map_err(|e| JsonStoreError::io(&state_path, e))?;
            serde_json::from_slice::<Snapshot>(&raw)?
        } else {
            Snapshot::default()
        };

        let loaded = read_log(&root.join(LOG_FILE))?;
        let transactions = loaded.entries.len() as u64;
        let (tables, mut findings) = Tables::restore(snapshot, loaded.entries);
        if let Some(torn) = loaded.torn_tail {
            findings.push(torn);
        }

        let integrity = IntegrityReport {
            members: tables.member_count(),
            transactions,
            findings,
        };
        for finding in &integrity.findings {
            warn!(path = %root.display(), "integrity: {finding}");
        }

        if !integrity.is_healthy() {
            write_snapshot_at(&root, &tables)?;
        }
        let store = Self {
            root,
            tables: Mutex::new(tables),
            integrity,
        };
        info!(
            path = %store.root.display(),
            members = store.integrity.members,
            transactions = store.integrity.transactions,
            "opened JSON store"
        );
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// What the integrity check found when the store was opened.
    pub fn integrity(&self) -> &IntegrityReport {
        &self.integrity
    }

    pub(crate) fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }

    pub(crate) fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("store mutex poisoned".into()))
    }

    pub(crate) fn write_snapshot(&self, tables: &Tables) -> Result<(), JsonStoreError> {
        write_snapshot_at(&self.root, tables)
    }

    /// Apply `op` to the tables and persist the result.
    ///
    /// If the snapshot cannot be written the in-memory tables are reloaded
    /// from disk, which still holds the state from before `op`.
    pub(crate) fn mutate<T>(
        &self,
        op: impl FnOnce(&mut Tables) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut tables = self.lock()?;
        let out = op(&mut tables)?;
        if let Err(e) = self.write_snapshot(&tables) {
            warn!(error = %e, "snapshot write failed, reloading from disk");
            *tables = self.reload()?;
            return Err(e.into());
        }
        Ok(out)
    }

    fn reload(&self) -> Result<Tables, JsonStoreError> {
        let state_path = self.root.join(STATE_FILE);
        let snapshot = if state_path.exists() {
            let raw = fs::read(&state_path).map_err(|e| JsonStoreError::io(&state_path, e))?;
            serde_json::from_slice::<Snapshot>(&raw)?
        } else {
            Snapshot::default()
        };
        let loaded = read_log(&self.log_path())?;
        Ok(Tables::restore(snapshot, loaded.entries).0)
    }
}

/// Write `state.json` via a temp file and rename, so a crash leaves either the
/// old or the new file in place.
fn write_snapshot_at(root: &Path, tables: &Tables) -> Result<(), JsonStoreError> {
    let path = root.join(STATE_FILE);
    let tmp = root.join(format!("{STATE_FILE}.tmp"));
    let bytes = serde_json::to_vec_pretty(&tables.snapshot())?;
    let mut file = fs::File::create(&tmp).map_err(|e| JsonStoreError::io(&tmp, e))?;
    file.write_all(&bytes)
        .and_then(|_| file.sync_all())
        .map_err(|e| JsonStoreError::io(&tmp, e))?;
    fs::rename(&tmp, &path).map_err(|e| JsonStoreError::io(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("data")).unwrap();
        assert!(store.uploads_dir().is_dir());
        assert!(store.integrity().is_healthy());
        assert_eq!(store.integrity().members, 0);
    }

    #[test]
    fn unreadable_state_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(STATE_FILE), b"not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(dir.path()),
            Err(JsonStoreError::Serialization(_))
        ));
    }
}
