//! Backup and restore of the history ledger, notes table and last-played pointer.

use crate::backend::Backend;
use crate::codec::{self, keys};
use crate::error::{Result, RestoreStep, StoreError};
use crate::evict::keyed_write;
use crate::history::insert_item;
use crate::store::{CommitFailure, PersistError, PodStore, Write};
use podnote_core::{cmp_recency, is_supported_version, Backup, BackupData, SnapshotInfo};
use serde_json::Value;
use std::collections::HashSet;

/// Handle for snapshotting and rehydrating the store.
pub struct BackupService<'a, B: Backend> {
    store: &'a mut PodStore<B>,
}

impl<B: Backend> PodStore<B> {
    pub fn backups(&mut self) -> BackupService<'_, B> {
        BackupService { store: self }
    }
}

/// Pretty JSON, the on-disk and clipboard form of a backup.
pub fn export_as_text(backup: &Backup) -> Result<String> {
    Ok(serde_json::to_string_pretty(backup)?)
}

/// Parse and validate backup text.
///
/// Requires `version`, `timestamp` and a `data` object, and a version this
/// build can restore. Every failure is `InvalidBackupFormat`.
pub fn import_from_text(text: &str) -> Result<Backup> {
    let invalid = |msg: String| StoreError::InvalidBackupFormat(msg);
    let value: Value = serde_json::from_str(text).map_err(|e| invalid(format!("not JSON: {e}")))?;
    let Some(obj) = value.as_object() else {
        return Err(invalid("expected a JSON object".into()));
    };
    let version = match obj.get("version") {
        Some(Value::String(v)) => v.clone(),
        Some(_) => return Err(invalid("`version` must be a string".into())),
        None => return Err(invalid("missing `version`".into())),
    };
    match obj.get("timestamp") {
        Some(Value::String(_)) => {}
        Some(_) => return Err(invalid("`timestamp` must be a string".into())),
        None => return Err(invalid("missing `timestamp`".into())),
    }
    match obj.get("data") {
        Some(Value::Object(_)) => {}
        Some(_) => return Err(invalid("`data` must be an object".into())),
        None => return Err(invalid("missing `data`".into())),
    }
    if !is_supported_version(&version) {
        return Err(invalid(format!("unsupported version {version}")));
    }
    serde_json::from_value(value).map_err(|e| invalid(e.to_string()))
}

impl<B: Backend> BackupService<'_, B> {
    /// Read every restorable collection into a new backup. Writes nothing.
    pub fn create_snapshot(&self) -> Result<Backup> {
        let data = BackupData {
            history: self.store.read_history()?,
            notes: self.store.read(keys::NOTES)?,
            last_played: self.store.read(keys::LAST_PLAYED)?,
        };
        Ok(Backup::new(data))
    }

    pub fn export_as_text(&self, backup: &Backup) -> Result<String> {
        export_as_text(backup)
    }

    pub fn import_from_text(&self, text: &str) -> Result<Backup> {
        import_from_text(text)
    }

    pub fn info(&self, backup: &Backup) -> SnapshotInfo {
        backup.info()
    }

    /// Rehydrate the store from `backup`.
    ///
    /// History items go through the ledger's insertion rule one by one, so
    /// the cap and uniqueness hold. The notes table is replaced wholesale and
    /// last-played is overwritten only when the backup has one. All three are
    /// encoded and capacity-checked together before anything is written; a
    /// failed write puts back the keys already written.
    pub fn restore(&mut self, backup: &Backup) -> Result<()> {
        if !is_supported_version(&backup.version) {
            return Err(StoreError::InvalidBackupFormat(format!(
                "unsupported version {}",
                backup.version
            )));
        }
        for (episode_id, notes) in backup.data.notes.iter() {
            if let Some(stray) = notes.iter().find(|n| n.episode_id != episode_id) {
                return Err(StoreError::InvalidBackupFormat(format!(
                    "note {} is filed under episode {episode_id} but belongs to {}",
                    stray.id, stray.episode_id
                )));
            }
            let mut seen = HashSet::new();
            if let Some(dup) = notes.iter().find(|n| !seen.insert(n.id.as_str())) {
                return Err(StoreError::DuplicateNoteId {
                    episode_id: episode_id.to_string(),
                    note_id: dup.id.clone(),
                });
            }
        }

        let max = self.store.config.max_history;
        let data = &backup.data;
        let mut steps: Vec<RestoreStep> = Vec::new();
        let result = self.store.persist("backup", |s| {
            let mut history = s.read_history()?;
            // Oldest first, so the newest backup items end up at the front.
            for item in data.history.iter().rev() {
                insert_item(&mut history, item.clone(), max);
            }
            history.sort_by(cmp_recency);

            let mut writes = vec![
                Write::set(keys::HISTORY, codec::encode(&history)?),
                keyed_write(keys::NOTES, &data.notes)?,
            ];
            steps = vec![RestoreStep::History, RestoreStep::Notes];
            if let Some(lp) = &data.last_played {
                writes.push(Write::set(keys::LAST_PLAYED, codec::encode(lp)?));
                steps.push(RestoreStep::LastPlayed);
            }
            Ok(writes)
        });

        match result {
            Ok(()) => {}
            Err(PersistError::Rejected(e)) => return Err(e),
            Err(PersistError::Commit(CommitFailure { index, error })) => {
                let step = steps.get(index).copied().unwrap_or(RestoreStep::History);
                tracing::error!(%step, error = %error, "restore failed; rolled back");
                return Err(StoreError::Restore {
                    step,
                    source: Box::new(error),
                });
            }
        }

        let info = backup.info();
        tracing::info!(
            version = %backup.version,
            history = info.history_count,
            notes = info.notes_count,
            last_played = info.has_last_played,
            "backup restored"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, MemoryBackend};
    use crate::config::StoreConfig;
    use podnote_core::{HistoryItem, LastPlayed, Note, NoteCategory, NoteInput};

    fn store() -> PodStore<MemoryBackend> {
        PodStore::new(MemoryBackend::new(), StoreConfig::default())
    }

    fn populate<B: Backend>(store: &mut PodStore<B>) {
        store.history().add(HistoryItem::new("ep1", "One", "Show")).unwrap();
        store.history().add(HistoryItem::new("ep2", "Two", "Show")).unwrap();
        store
            .notes()
            .add(
                "ep1",
                NoteInput {
                    text: "remember this".into(),
                    category: Some(NoteCategory::Quote),
                    ..Default::default()
                },
            )
            .unwrap();
        store.notes().add("ep1", NoteInput::default()).unwrap();
        store.notes().add("ep2", NoteInput::default()).unwrap();
        store.last_played().save("ep2", 90_000).unwrap();
    }

    #[test]
    fn export_import_round_trip_preserves_info() {
        let mut store = store();
        populate(&mut store);
        let snapshot = store.backups().create_snapshot().unwrap();
        let text = export_as_text(&snapshot).unwrap();
        let back = import_from_text(&text).unwrap();
        assert_eq!(back.info(), snapshot.info());
        assert_eq!(back, snapshot);
        let info = snapshot.info();
        assert_eq!(info.history_count, 2);
        assert_eq!(info.notes_count, 3);
        assert!(info.has_last_played);
    }

    #[test]
    fn exported_notes_are_an_association_list() {
        let mut store = store();
        populate(&mut store);
        let snapshot = store.backups().create_snapshot().unwrap();
        let value: Value = serde_json::from_str(&export_as_text(&snapshot).unwrap()).unwrap();
        let notes = value["data"]["notes"].as_array().unwrap();
        assert_eq!(notes[0][0], "ep1");
        assert_eq!(notes[0][1].as_array().unwrap().len(), 2);
        assert!(value["data"]["lastPlayed"].is_object());
    }

    #[test]
    fn import_rejects_malformed_text() {
        let cases = [
            "not json at all",
            "[]",
            r#"{"timestamp":"2024-01-01T00:00:00Z","data":{}}"#,
            r#"{"version":"1.0.0","data":{}}"#,
            r#"{"version":"1.0.0","timestamp":"2024-01-01T00:00:00Z"}"#,
            r#"{"version":"2.0.0","timestamp":"2024-01-01T00:00:00Z","data":{}}"#,
            r#"{"version":"1.0.0","timestamp":"2024-01-01T00:00:00Z","data":{"history":"nope"}}"#,
        ];
        for text in cases {
            let err = import_from_text(text).unwrap_err();
            assert!(
                matches!(err, StoreError::InvalidBackupFormat(_)),
                "accepted: {text}"
            );
        }
    }

    #[test]
    fn import_accepts_minor_versions_and_legacy_notes() {
        let text = r#"{
            "version": "1.2.0",
            "timestamp": "2024-03-01T10:00:00.000Z",
            "data": {
                "history": [],
                "notes": {"ep1": []},
                "lastPlayed": null
            }
        }"#;
        let backup = import_from_text(text).unwrap();
        assert_eq!(backup.data.notes.len(), 1);
        assert!(backup.data.last_played.is_none());
    }

    #[test]
    fn restore_rehydrates_empty_store() {
        let mut source = store();
        populate(&mut source);
        let snapshot = source.backups().create_snapshot().unwrap();

        let mut target = store();
        target.backups().restore(&snapshot).unwrap();
        let restored = target.backups().create_snapshot().unwrap();
        assert_eq!(restored.data.history, snapshot.data.history);
        assert_eq!(restored.data.notes, snapshot.data.notes);
        assert_eq!(restored.data.last_played, snapshot.data.last_played);
    }

    #[test]
    fn restore_merges_history_and_replaces_notes() {
        let mut target = store();
        target.history().add(HistoryItem::new("local", "Local", "Show")).unwrap();
        target.notes().add("local", NoteInput::default()).unwrap();
        let kept_pointer = target.last_played().save("local", 5).unwrap();

        let mut notes = podnote_core::Keyed::new();
        notes.insert("ep1", vec![Note::new("ep1", NoteInput::default())]);
        let backup = Backup::new(BackupData {
            history: vec![HistoryItem::new("ep1", "One", "Show")],
            notes: notes.clone(),
            last_played: None,
        });
        target.backups().restore(&backup).unwrap();

        let mut ids: Vec<String> = target
            .history()
            .load_all()
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["ep1", "local"]);
        assert_eq!(target.notes().all().unwrap(), notes);
        assert_eq!(target.last_played().load().unwrap(), Some(kept_pointer));
    }

    #[test]
    fn restore_respects_history_cap() {
        let config = StoreConfig {
            max_history: 3,
            ..StoreConfig::default()
        };
        let mut target = PodStore::new(MemoryBackend::new(), config);
        let history = (0..5)
            .map(|i| HistoryItem::new(format!("ep{i}"), "t", "s"))
            .collect();
        let backup = Backup::new(BackupData {
            history,
            ..BackupData::default()
        });
        target.backups().restore(&backup).unwrap();
        assert_eq!(target.history().len().unwrap(), 3);
    }

    #[test]
    fn restore_over_ceiling_writes_nothing() {
        let mut source = store();
        populate(&mut source);
        let snapshot = source.backups().create_snapshot().unwrap();

        let config = StoreConfig {
            ceiling_bytes: 128,
            ..StoreConfig::default()
        };
        let mut target = PodStore::new(MemoryBackend::new(), config);
        let err = target.backups().restore(&snapshot).unwrap_err();
        assert!(matches!(err, StoreError::CapacityExceeded { collection: "backup", .. }));
        assert!(target.backend().keys().unwrap().is_empty());
    }

    /// Backend whose `set` fails for one key once armed.
    struct FlakyBackend {
        inner: MemoryBackend,
        fail_key: Option<&'static str>,
    }

    impl Backend for FlakyBackend {
        fn get(&self, key: &str) -> std::result::Result<Option<String>, BackendError> {
            self.inner.get(key)
        }
        fn set(&mut self, key: &str, value: &str) -> std::result::Result<(), BackendError> {
            if self.fail_key == Some(key) {
                return Err(BackendError::Io(std::io::Error::other("write refused")));
            }
            self.inner.set(key, value)
        }
        fn remove(&mut self, key: &str) -> std::result::Result<(), BackendError> {
            if self.fail_key == Some(key) {
                return Err(BackendError::Io(std::io::Error::other("write refused")));
            }
            self.inner.remove(key)
        }
        fn keys(&self) -> std::result::Result<Vec<String>, BackendError> {
            self.inner.keys()
        }
    }

    #[test]
    fn failed_step_rolls_back_earlier_steps() {
        let backend = FlakyBackend {
            inner: MemoryBackend::new(),
            fail_key: None,
        };
        let mut target = PodStore::new(backend, StoreConfig::default());
        populate(&mut target);
        let before = target.backups().create_snapshot().unwrap();

        let backup = Backup::new(BackupData {
            history: vec![HistoryItem::new("new", "New", "Show")],
            notes: podnote_core::Keyed::new(),
            last_played: Some(LastPlayed::now("new", 1)),
        });
        target.backend.fail_key = Some(keys::LAST_PLAYED);
        let err = target.backups().restore(&backup).unwrap_err();
        match err {
            StoreError::Restore { step, .. } => assert_eq!(step, RestoreStep::LastPlayed),
            other => panic!("unexpected error: {other}"),
        }

        target.backend.fail_key = None;
        let after = target.backups().create_snapshot().unwrap();
        assert_eq!(after.data, before.data);
    }

    #[test]
    fn restore_rejects_duplicate_note_ids() {
        let note = Note::new("ep1", NoteInput::default());
        let mut notes = podnote_core::Keyed::new();
        notes.insert("ep1", vec![note.clone(), note]);
        let backup = Backup::new(BackupData {
            notes,
            ..BackupData::default()
        });
        let mut target = store();
        let err = target.backups().restore(&backup).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateNoteId { .. }));
    }
    #[test]
    fn restore_rejects_notes_filed_under_another_episode() {
        let mut notes = podnote_core::Keyed::new();
        notes.insert("ep1", vec![Note::new("ep2", NoteInput::default())]);
        let backup = Backup::new(BackupData {
            notes,
            ..BackupData::default()
        });
        let mut target = store();
        let err = target.backups().restore(&backup).unwrap_err();
        assert!(matches!(err, StoreError::InvalidBackupFormat(_)));
        assert!(target.backend().keys().unwrap().is_empty());
    }
}
