use crate::backend::{Backend, BackendError};
use crate::codec::{self, keys};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use serde::de::DeserializeOwned;

/// One pending backend mutation. `None` removes the key.
#[derive(Debug, Clone)]
pub(crate) struct Write {
    pub key: &'static str,
    pub value: Option<String>,
}

impl Write {
    pub fn set(key: &'static str, value: String) -> Self {
        Self {
            key,
            value: Some(value),
        }
    }

    pub fn remove(key: &'static str) -> Self {
        Self { key, value: None }
    }
}

/// A failed commit: which write failed and why. Earlier writes were rolled back.
#[derive(Debug)]
pub(crate) struct CommitFailure {
    pub index: usize,
    pub error: StoreError,
}

/// Outcome of [`PodStore::persist`] when something went wrong.
#[derive(Debug)]
pub(crate) enum PersistError {
    /// Failed before any key was touched.
    Rejected(StoreError),
    /// Failed while writing; the store is back to its previous state.
    Commit(CommitFailure),
}

impl From<PersistError> for StoreError {
    fn from(e: PersistError) -> Self {
        match e {
            PersistError::Rejected(e) => e,
            PersistError::Commit(c) => c.error,
        }
    }
}

impl From<StoreError> for PersistError {
    fn from(e: StoreError) -> Self {
        PersistError::Rejected(e)
    }
}

/// The store: every collection, one backend, one capacity budget.
///
/// Construct once with an injected [`StoreConfig`] and pass it to whoever
/// needs it. All access to the backend's keys goes through here.
pub struct PodStore<B: Backend> {
    pub(crate) backend: B,
    pub(crate) config: StoreConfig,
}

/// Summary of what the store currently holds.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StoreStats {
    pub history_count: usize,
    pub notes_count: usize,
    pub episodes_with_notes: usize,
    pub transcripts_cached: usize,
    pub has_last_played: bool,
    pub usage: crate::capacity::Usage,
}

impl<B: Backend> PodStore<B> {
    pub fn new(backend: B, config: StoreConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Read and decode a collection; corrupt payloads read as empty.
    pub(crate) fn read<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        let raw = self.backend.get(key)?;
        Ok(codec::decode(key, raw.as_deref()))
    }

    /// Projected growth in bytes if `writes` were applied. Shrinking writes
    /// offset growing ones; the result never goes below zero.
    pub(crate) fn growth(&self, writes: &[Write]) -> Result<u64> {
        let mut delta: i64 = 0;
        for w in writes {
            let current = self
                .backend
                .get(w.key)?
                .map(|v| (w.key.len() + v.len()) as i64)
                .unwrap_or(0);
            let next = w
                .value
                .as_ref()
                .map(|v| (w.key.len() + v.len()) as i64)
                .unwrap_or(0);
            delta += next - current;
        }
        Ok(delta.max(0) as u64)
    }

    /// Write without any capacity check. Every backend mutation goes
    /// through here.
    pub(crate) fn write_unchecked(&mut self, w: &Write) -> Result<()> {
        match &w.value {
            Some(v) => self.backend.set(w.key, v)?,
            None => self.backend.remove(w.key)?,
        }
        tracing::debug!(
            key = w.key,
            bytes = w.value.as_ref().map(String::len).unwrap_or(0),
            removed = w.value.is_none(),
            "persisted"
        );
        Ok(())
    }

    /// Apply writes in order. On failure, keys already written are put back
    /// to their previous values before returning.
    pub(crate) fn commit(&mut self, writes: &[Write]) -> std::result::Result<(), CommitFailure> {
        let mut undo: Vec<Write> = Vec::with_capacity(writes.len());
        for (index, w) in writes.iter().enumerate() {
            let previous = match self.backend.get(w.key) {
                Ok(p) => p,
                Err(e) => {
                    self.rollback(&undo);
                    return Err(CommitFailure {
                        index,
                        error: e.into(),
                    });
                }
            };
            if let Err(error) = self.write_unchecked(w) {
                self.rollback(&undo);
                return Err(CommitFailure { index, error });
            }
            undo.push(Write {
                key: w.key,
                value: previous,
            });
        }
        Ok(())
    }

    fn rollback(&mut self, undo: &[Write]) {
        for w in undo.iter().rev() {
            if let Err(e) = self.write_unchecked(w) {
                tracing::error!(key = w.key, error = %e, "rollback failed; collection may be stale");
            }
        }
    }

    /// Capacity-checked persistence of one or more collections.
    ///
    /// `build` derives the writes from the current stored state. It runs
    /// again after any eviction so the writes never resurrect evicted data.
    /// A backend quota rejection triggers one emergency eviction and retry.
    pub(crate) fn persist<F>(
        &mut self,
        collection: &'static str,
        mut build: F,
    ) -> std::result::Result<(), PersistError>
    where
        F: FnMut(&Self) -> Result<Vec<Write>>,
    {
        let mut staged: Option<Vec<Write>> = None;
        self.ensure_capacity(collection, |s| {
            let writes = build(s)?;
            let growth = s.growth(&writes)?;
            staged = Some(writes);
            Ok(growth)
        })?;
        let writes = match staged {
            Some(w) => w,
            None => build(self)?,
        };

        match self.commit(&writes) {
            Ok(()) => {}
            Err(CommitFailure {
                error: StoreError::Backend(BackendError::QuotaExceeded { .. }),
                ..
            }) => {
                tracing::warn!(collection, "backend rejected write over quota; running emergency eviction");
                let report = self.emergency_evict()?;
                let writes = build(self)?;
                self.commit(&writes).map_err(|failure| match failure.error {
                    StoreError::Backend(BackendError::QuotaExceeded { required, limit, .. }) => {
                        PersistError::Rejected(StoreError::CapacityExceeded {
                            collection,
                            required,
                            ceiling: limit,
                            evicted: report.history_removed.len(),
                        })
                    }
                    _ => PersistError::Commit(failure),
                })?;
            }
            Err(failure) => return Err(PersistError::Commit(failure)),
        }

        Ok(())
    }

    /// Remove every store-owned key. Keys written by others are left alone.
    pub fn clear_all(&mut self) -> Result<()> {
        for key in keys::ALL {
            self.write_unchecked(&Write::remove(key))?;
        }
        tracing::info!("cleared all collections");
        Ok(())
    }

    pub fn stats(&mut self) -> Result<StoreStats> {
        let history_count = self.history().load_all()?.len();
        let notes = self.notes().all()?;
        Ok(StoreStats {
            history_count,
            notes_count: notes.values().map(Vec::len).sum(),
            episodes_with_notes: notes.len(),
            transcripts_cached: self.transcripts().episode_ids()?.len(),
            has_last_played: self.last_played().load()?.is_some(),
            usage: self.usage()?,
        })
    }
}
