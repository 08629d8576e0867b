use crate::backend::Backend;
use crate::codec::{self, keys};
use crate::error::Result;
use crate::evict::keyed_write;
use crate::store::{PodStore, Write};
use crate::transcripts::TranscriptMap;
use podnote_core::{clock, cmp_recency, HistoryItem, HistoryPatch};

/// Bounded, deduplicated, recency-ordered ledger of visited episodes.
pub struct HistoryLedger<'a, B: Backend> {
    store: &'a mut PodStore<B>,
}

impl<B: Backend> PodStore<B> {
    pub fn history(&mut self) -> HistoryLedger<'_, B> {
        HistoryLedger { store: self }
    }

    /// The stored ledger, most recently played first.
    pub(crate) fn read_history(&self) -> Result<Vec<HistoryItem>> {
        let mut items: Vec<HistoryItem> = self.read(keys::HISTORY)?;
        // Stored order is not trusted: the key may have been edited externally.
        items.sort_by(cmp_recency);
        Ok(items)
    }
}

/// Insertion rule: drop any entry with the same id, prepend, cap.
pub(crate) fn insert_item(history: &mut Vec<HistoryItem>, item: HistoryItem, max: usize) {
    history.retain(|h| h.id != item.id);
    history.insert(0, item);
    history.truncate(max);
}

impl<B: Backend> HistoryLedger<'_, B> {
    /// Add or re-promote an episode.
    pub fn add(&mut self, item: HistoryItem) -> Result<()> {
        let max = self.store.config.max_history;
        let id = item.id.clone();
        self.store.persist("history", |s| {
            let mut history = s.read_history()?;
            insert_item(&mut history, item.clone(), max);
            Ok(vec![Write::set(keys::HISTORY, codec::encode(&history)?)])
        })?;
        tracing::info!(id = %id, "added to history");
        Ok(())
    }

    /// Merge `patch` into the entry and stamp it as just played.
    ///
    /// Returns `false` (and writes nothing) when no entry has this id.
    pub fn update(&mut self, id: &str, patch: HistoryPatch) -> Result<bool> {
        let Some(current) = self.get(id)? else {
            tracing::info!(id, "history update skipped: no such item");
            return Ok(false);
        };
        patch.validate(&current)?;

        let mut applied = false;
        self.store.persist("history", |s| {
            let mut history = s.read_history()?;
            applied = false;
            let Some(entry) = history.iter_mut().find(|h| h.id == id) else {
                // Evicted while making room.
                return Ok(Vec::new());
            };
            patch.clone().apply(entry)?;
            entry.last_played_at = clock::now_rfc3339();
            applied = true;
            Ok(vec![Write::set(keys::HISTORY, codec::encode(&history)?)])
        })?;
        if applied {
            tracing::debug!(id, "history item updated");
        } else {
            tracing::info!(id, "history update dropped: item evicted");
        }
        Ok(applied)
    }

    /// Record a new playback position for an episode.
    pub fn update_position(&mut self, id: &str, position_ms: u64) -> Result<bool> {
        self.update(id, HistoryPatch::position(position_ms))
    }

    /// Remove an entry and its cached transcript. Notes are kept.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        let mut history = self.store.read_history()?;
        let before = history.len();
        history.retain(|h| h.id != id);
        if history.len() == before {
            return Ok(false);
        }

        let mut writes = vec![Write::set(keys::HISTORY, codec::encode(&history)?)];
        let mut transcripts: TranscriptMap = self.store.read(keys::TRANSCRIPTS)?;
        if transcripts.remove(id).is_some() {
            writes.push(keyed_write(keys::TRANSCRIPTS, &transcripts)?);
        }
        self.store.commit(&writes).map_err(|f| f.error)?;
        tracing::info!(id, "deleted from history");
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.store.write_unchecked(&Write::remove(keys::HISTORY))?;
        tracing::info!("history cleared");
        Ok(())
    }

    /// Every entry, most recently played first.
    pub fn load_all(&self) -> Result<Vec<HistoryItem>> {
        self.store.read_history()
    }

    pub fn get(&self, id: &str) -> Result<Option<HistoryItem>> {
        Ok(self.load_all()?.into_iter().find(|h| h.id == id))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.load_all()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
