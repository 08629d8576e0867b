use crate::backend::{check_quota, used_bytes, Backend, BackendError};
use crate::paths::{write_atomic, StorePaths};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io;

/// Hard limit of the on-disk store, mirroring a browser origin's quota.
pub const DEFAULT_BACKEND_QUOTA: u64 = 5 * 1024 * 1024;

/// Key-value backend persisted as one JSON object in `store.json`.
///
/// Every mutation rewrites the file atomically. An exclusive lock on
/// `LOCK` is held for the backend's lifetime; a second process fails fast
/// instead of racing.
pub struct FileBackend {
    paths: StorePaths,
    entries: BTreeMap<String, String>,
    quota: Option<u64>,
    _lock: File,
}

impl FileBackend {
    pub fn open(paths: StorePaths, quota: Option<u64>) -> Result<Self, BackendError> {
        paths.ensure_layout()?;
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&paths.lock_file)?;
        lock.try_lock_exclusive().map_err(|_| {
            BackendError::Io(io::Error::new(
                io::ErrorKind::WouldBlock,
                format!(
                    "store is locked by another process ({})",
                    paths.lock_file.display()
                ),
            ))
        })?;

        let entries = if paths.store_json.exists() {
            let content = std::fs::read_to_string(&paths.store_json)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    BackendError::Corrupt(format!("{}: {e}", paths.store_json.display()))
                })?
            }
        } else {
            BTreeMap::new()
        };
        tracing::debug!(
            path = %paths.store_json.display(),
            keys = entries.len(),
            "opened file backend"
        );
        Ok(Self {
            paths,
            entries,
            quota,
            _lock: lock,
        })
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn used_bytes(&self) -> u64 {
        used_bytes(&self.entries)
    }

    fn flush(&self) -> Result<(), BackendError> {
        let json = serde_json::to_string(&self.entries)
            .map_err(|e| BackendError::Corrupt(e.to_string()))?;
        write_atomic(&self.paths.store_json, json.as_bytes())?;
        Ok(())
    }
}

impl Backend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), BackendError> {
        check_quota(&self.entries, self.quota, key, value)?;
        let previous = self.entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.flush() {
            match previous {
                Some(old) => self.entries.insert(key.to_string(), old),
                None => self.entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), BackendError> {
        let Some(previous) = self.entries.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.flush() {
            self.entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = StorePaths::discover(tmp.path());
        {
            let mut b = FileBackend::open(paths.clone(), None).unwrap();
            b.set("a", "1").unwrap();
            b.set("b", "2").unwrap();
            b.remove("a").unwrap();
        }
        let b = FileBackend::open(paths, None).unwrap();
        assert_eq!(b.get("a").unwrap(), None);
        assert_eq!(b.get("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn second_open_is_locked_out() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = StorePaths::discover(tmp.path());
        let first = FileBackend::open(paths.clone(), None).unwrap();
        assert!(FileBackend::open(paths.clone(), None).is_err());
        drop(first);
        assert!(FileBackend::open(paths, None).is_ok());
    }

    #[test]
    fn quota_rejection_leaves_file_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = StorePaths::discover(tmp.path());
        let mut b = FileBackend::open(paths.clone(), Some(8)).unwrap();
        b.set("k", "v").unwrap();
        let err = b.set("big", "0123456789").unwrap_err();
        assert!(matches!(err, BackendError::QuotaExceeded { .. }));
        drop(b);
        let b = FileBackend::open(paths, Some(8)).unwrap();
        assert_eq!(b.keys().unwrap(), vec!["k".to_string()]);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = StorePaths::discover(tmp.path());
        std::fs::write(&paths.store_json, "{not json").unwrap();
        assert!(matches!(
            FileBackend::open(paths, None),
            Err(BackendError::Corrupt(_))
        ));
    }
}
