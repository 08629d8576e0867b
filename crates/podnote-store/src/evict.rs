//! Eviction: age-based truncation of the history ledger, then reclamation
//! of the cached data that belonged to the evicted episodes.

use crate::backend::Backend;
use crate::codec::{self, keys};
use crate::error::Result;
use crate::store::{PodStore, Write};
use crate::transcripts::TranscriptMap;
use podnote_core::{HistoryItem, Keyed, Note};
use serde::Serialize;
use std::collections::HashSet;
use time::{Duration, OffsetDateTime};

/// Why data was evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionMode {
    /// Proactive sweep of items older than the retention window.
    Retention,
    /// The backend itself rejected a write over its hard quota.
    Emergency,
}

impl std::fmt::Display for EvictionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvictionMode::Retention => write!(f, "retention"),
            EvictionMode::Emergency => write!(f, "emergency"),
        }
    }
}

/// What a sweep removed (or, for a plan, would remove).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvictionReport {
    pub mode: EvictionMode,
    pub history_removed: Vec<String>,
    pub transcripts_removed: Vec<String>,
    pub notes_removed: Vec<String>,
    pub bytes_freed: u64,
}

impl EvictionReport {
    fn empty(mode: EvictionMode) -> Self {
        Self {
            mode,
            history_removed: Vec::new(),
            transcripts_removed: Vec::new(),
            notes_removed: Vec::new(),
            bytes_freed: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.history_removed.is_empty()
            && self.transcripts_removed.is_empty()
            && self.notes_removed.is_empty()
    }
}

/// Encode a keyed collection, removing the key once it is empty.
pub(crate) fn keyed_write<V: Serialize>(key: &'static str, map: &Keyed<V>) -> Result<Write> {
    if map.is_empty() {
        Ok(Write::remove(key))
    } else {
        Ok(Write::set(key, codec::encode(map)?))
    }
}

impl<B: Backend> PodStore<B> {
    /// Preview a retention sweep without writing anything.
    pub fn plan_sweep(&self) -> Result<EvictionReport> {
        self.plan_sweep_at(OffsetDateTime::now_utc())
    }

    pub fn plan_sweep_at(&self, now: OffsetDateTime) -> Result<EvictionReport> {
        Ok(self.plan_at(now)?.1)
    }

    /// Run the two-phase retention sweep now.
    pub fn sweep(&mut self) -> Result<EvictionReport> {
        self.sweep_at(OffsetDateTime::now_utc())
    }

    pub fn sweep_at(&mut self, now: OffsetDateTime) -> Result<EvictionReport> {
        let (writes, report) = self.plan_at(now)?;
        for w in &writes {
            self.write_unchecked(w)?;
        }
        if report.is_empty() {
            tracing::debug!("retention sweep found nothing to evict");
        } else {
            tracing::info!(
                history = report.history_removed.len(),
                transcripts = report.transcripts_removed.len(),
                notes = report.notes_removed.len(),
                bytes_freed = report.bytes_freed,
                "retention sweep evicted data"
            );
        }
        Ok(report)
    }

    fn plan_at(&self, now: OffsetDateTime) -> Result<(Vec<Write>, EvictionReport)> {
        let cutoff = now - Duration::days(i64::from(self.config.retention_days));
        let mut report = EvictionReport::empty(EvictionMode::Retention);
        let mut writes = Vec::new();

        // Phase 1: age-based truncation. Unparseable timestamps count as expired.
        let history: Vec<HistoryItem> = self.read(keys::HISTORY)?;
        let (kept, expired): (Vec<HistoryItem>, Vec<HistoryItem>) = history
            .into_iter()
            .partition(|item| item.last_played().is_some_and(|t| t > cutoff));
        if !expired.is_empty() {
            report.history_removed = expired.iter().map(|i| i.id.clone()).collect();
            writes.push(Write::set(keys::HISTORY, codec::encode(&kept)?));
        }

        // Phase 2: cached transcripts with no surviving history item, and the
        // notes of the episodes phase 1 aged out.
        let surviving: HashSet<&str> = kept.iter().map(|i| i.id.as_str()).collect();
        let mut transcripts: TranscriptMap = self.read(keys::TRANSCRIPTS)?;
        report.transcripts_removed = transcripts.retain_keys(|id| surviving.contains(id));
        if !report.transcripts_removed.is_empty() {
            writes.push(keyed_write(keys::TRANSCRIPTS, &transcripts)?);
        }

        let aged_out: HashSet<&str> = report.history_removed.iter().map(String::as_str).collect();
        let mut notes: Keyed<Vec<Note>> = self.read(keys::NOTES)?;
        report.notes_removed = notes.retain_keys(|id| !aged_out.contains(id));
        if !report.notes_removed.is_empty() {
            writes.push(keyed_write(keys::NOTES, &notes)?);
        }

        report.bytes_freed = self.shrinkage(&writes)?;
        Ok((writes, report))
    }

    /// Bytes released if `writes` were applied.
    fn shrinkage(&self, writes: &[Write]) -> Result<u64> {
        let mut freed: i64 = 0;
        for w in writes {
            let before = self.backend.get(w.key)?.map(|v| v.len()).unwrap_or(0) as i64;
            let after = w.value.as_ref().map(String::len).unwrap_or(0) as i64;
            freed += before - after;
        }
        Ok(freed.max(0) as u64)
    }

    /// Last-resort pass after the backend refused a write: the retention
    /// sweep, then the oldest history items (with their cached transcripts)
    /// one at a time until usage drops below the warning ratio.
    pub(crate) fn emergency_evict(&mut self) -> Result<EvictionReport> {
        let mut report = self.sweep()?;
        report.mode = EvictionMode::Emergency;

        while self.is_near_full()? {
            let mut history = self.history().load_all()?;
            let Some(oldest) = history.pop() else {
                break;
            };
            let mut transcripts: TranscriptMap = self.read(keys::TRANSCRIPTS)?;
            let mut writes = vec![Write::set(keys::HISTORY, codec::encode(&history)?)];
            if transcripts.remove(&oldest.id).is_some() {
                writes.push(keyed_write(keys::TRANSCRIPTS, &transcripts)?);
                report.transcripts_removed.push(oldest.id.clone());
            }
            report.bytes_freed += self.shrinkage(&writes)?;
            for w in &writes {
                self.write_unchecked(w)?;
            }
            report.history_removed.push(oldest.id);
        }

        tracing::warn!(
            history = report.history_removed.len(),
            transcripts = report.transcripts_removed.len(),
            bytes_freed = report.bytes_freed,
            "emergency eviction finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::config::StoreConfig;
    use podnote_core::{clock, NoteInput};

    fn item_days_ago(id: &str, now: OffsetDateTime, days: i64) -> HistoryItem {
        let mut item = HistoryItem::new(id, id, "Show");
        item.last_played_at = clock::format_rfc3339(now - Duration::days(days));
        item
    }

    fn seeded(now: OffsetDateTime) -> PodStore<MemoryBackend> {
        let mut store = PodStore::new(MemoryBackend::new(), StoreConfig::default());
        let history = vec![
            item_days_ago("fresh", now, 1),
            item_days_ago("edge", now, 29),
            item_days_ago("stale", now, 31),
            item_days_ago("ancient", now, 400),
        ];
        store
            .backend
            .set(keys::HISTORY, &codec::encode(&history).unwrap())
            .unwrap();

        let mut transcripts = TranscriptMap::new();
        for id in ["fresh", "stale", "never-in-history"] {
            transcripts.insert(id, vec![serde_json::json!({"text": id})]);
        }
        store
            .backend
            .set(keys::TRANSCRIPTS, &codec::encode(&transcripts).unwrap())
            .unwrap();

        let mut notes = Keyed::new();
        for id in ["fresh", "stale", "deleted-by-user"] {
            notes.insert(id, vec![Note::new(id, NoteInput::default())]);
        }
        store
            .backend
            .set(keys::NOTES, &codec::encode(&notes).unwrap())
            .unwrap();
        store
    }

    #[test]
    fn sweep_removes_exactly_out_of_window_items() {
        let now = OffsetDateTime::now_utc();
        let mut store = seeded(now);
        let report = store.sweep_at(now).unwrap();

        let mut removed = report.history_removed.clone();
        removed.sort();
        assert_eq!(removed, vec!["ancient".to_string(), "stale".to_string()]);

        let ids: Vec<String> = store
            .history()
            .load_all()
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["fresh".to_string(), "edge".to_string()]);
        assert!(report.bytes_freed > 0);
    }

    #[test]
    fn sweep_reclaims_orphans_but_keeps_notes_of_manual_deletions() {
        let now = OffsetDateTime::now_utc();
        let mut store = seeded(now);
        let report = store.sweep_at(now).unwrap();

        let mut transcripts = report.transcripts_removed.clone();
        transcripts.sort();
        assert_eq!(transcripts, vec!["never-in-history", "stale"]);
        assert_eq!(report.notes_removed, vec!["stale".to_string()]);

        assert!(store.transcripts().load("fresh").unwrap().is_some());
        assert!(store.transcripts().load("stale").unwrap().is_none());
        assert_eq!(store.notes().load("deleted-by-user").unwrap().len(), 1);
        assert!(store.notes().load("stale").unwrap().is_empty());
    }

    #[test]
    fn plan_does_not_write() {
        let now = OffsetDateTime::now_utc();
        let store = seeded(now);
        let before = store.estimate_size().unwrap();
        let plan = store.plan_sweep_at(now).unwrap();
        assert_eq!(plan.history_removed.len(), 2);
        assert_eq!(store.estimate_size().unwrap(), before);
    }

    #[test]
    fn unparseable_timestamps_are_expired() {
        let now = OffsetDateTime::now_utc();
        let mut store = PodStore::new(MemoryBackend::new(), StoreConfig::default());
        let mut bad = HistoryItem::new("bad", "t", "s");
        bad.last_played_at = "last tuesday".into();
        store
            .backend
            .set(keys::HISTORY, &codec::encode(&vec![bad]).unwrap())
            .unwrap();
        let report = store.sweep_at(now).unwrap();
        assert_eq!(report.history_removed, vec!["bad".to_string()]);
    }

    #[test]
    fn empty_store_sweep_writes_nothing() {
        let mut store = PodStore::new(MemoryBackend::new(), StoreConfig::default());
        let report = store.sweep().unwrap();
        assert!(report.is_empty());
        assert!(store.backend().keys().unwrap().is_empty());
    }

    #[test]
    fn emergency_trims_oldest_until_below_warning() {
        let now = OffsetDateTime::now_utc();
        let config = StoreConfig {
            ceiling_bytes: 2_000,
            ..StoreConfig::default()
        };
        let mut store = PodStore::new(MemoryBackend::new(), config);
        let history: Vec<HistoryItem> = (0..10)
            .map(|i| item_days_ago(&format!("ep{i}"), now, i))
            .collect();
        store
            .backend
            .set(keys::HISTORY, &codec::encode(&history).unwrap())
            .unwrap();
        assert!(store.usage().unwrap().near_full);

        let report = store.emergency_evict().unwrap();
        assert_eq!(report.mode, EvictionMode::Emergency);
        assert!(!store.usage().unwrap().near_full);
        // Oldest go first; the most recent survives.
        assert_eq!(report.history_removed.first().map(String::as_str), Some("ep9"));
        let left = store.history().load_all().unwrap();
        assert_eq!(left.first().map(|i| i.id.as_str()), Some("ep0"));
    }
}
