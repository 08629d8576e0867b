use crate::clock;
use crate::keyed::Keyed;
use crate::types::{HistoryItem, LastPlayed, Note};
use serde::{Deserialize, Serialize};

/// Schema version stamped on new backups.
pub const BACKUP_VERSION: &str = "1.0.0";

/// Major schema version this build can restore.
pub const BACKUP_MAJOR: u64 = 1;

/// Media type of an exported backup.
pub const BACKUP_MIME: &str = "application/json";

/// Human-readable prefix of exported backup file names.
pub const BACKUP_FILE_PREFIX: &str = "podnote-backup";

/// A versioned, self-describing full-state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub version: String,
    /// RFC 3339 time the snapshot was taken.
    pub timestamp: String,
    pub data: BackupData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupData {
    #[serde(default)]
    pub history: Vec<HistoryItem>,
    #[serde(default)]
    pub notes: Keyed<Vec<Note>>,
    #[serde(default)]
    pub last_played: Option<LastPlayed>,
}

/// Read-only summary shown before a restore is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    pub version: String,
    pub date: String,
    pub history_count: usize,
    pub notes_count: usize,
    pub has_last_played: bool,
}

impl Backup {
    /// Wrap collections in a backup stamped with the current version and time.
    pub fn new(data: BackupData) -> Self {
        Self {
            version: BACKUP_VERSION.to_string(),
            timestamp: clock::now_rfc3339(),
            data,
        }
    }

    pub fn info(&self) -> SnapshotInfo {
        SnapshotInfo {
            version: self.version.clone(),
            date: display_date(&self.timestamp),
            history_count: self.data.history.len(),
            notes_count: self.data.notes.values().map(Vec::len).sum(),
            has_last_played: self.data.last_played.is_some(),
        }
    }

    /// `podnote-backup_<timestamp>.json` with `:` and `.` made filesystem-safe.
    pub fn file_name(&self) -> String {
        let safe: String = self
            .timestamp
            .chars()
            .map(|c| if c == ':' || c == '.' { '-' } else { c })
            .collect();
        format!("{BACKUP_FILE_PREFIX}_{safe}.json")
    }
}

/// Whether a backup written with schema `version` can be restored.
pub fn is_supported_version(version: &str) -> bool {
    let mut parts = version.trim().split('.');
    let major = parts.next().and_then(|m| m.parse::<u64>().ok());
    major == Some(BACKUP_MAJOR) && parts.all(|p| p.parse::<u64>().is_ok())
}

fn display_date(ts: &str) -> String {
    let fmt = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");
    clock::parse_rfc3339(ts)
        .map(|t| t.to_offset(time::UtcOffset::UTC))
        .and_then(|t| t.format(&fmt).ok())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NoteInput;

    fn sample() -> Backup {
        let mut notes = Keyed::new();
        notes.insert(
            "ep1",
            vec![
                Note::new("ep1", NoteInput::default()),
                Note::new("ep1", NoteInput::default()),
            ],
        );
        notes.insert("ep2", vec![Note::new("ep2", NoteInput::default())]);
        Backup {
            version: BACKUP_VERSION.into(),
            timestamp: "2024-05-06T07:08:09.010Z".into(),
            data: BackupData {
                history: vec![HistoryItem::new("ep1", "One", "Show")],
                notes,
                last_played: None,
            },
        }
    }

    #[test]
    fn info_counts_notes_across_episodes() {
        let info = sample().info();
        assert_eq!(info.history_count, 1);
        assert_eq!(info.notes_count, 3);
        assert!(!info.has_last_played);
        assert_eq!(info.date, "2024-05-06 07:08:09 UTC");
    }

    #[test]
    fn file_name_is_filesystem_safe() {
        assert_eq!(
            sample().file_name(),
            "podnote-backup_2024-05-06T07-08-09-010Z.json"
        );
    }

    #[test]
    fn wire_format_uses_pairs_and_null_last_played() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["version"], "1.0.0");
        assert!(value["data"]["notes"].is_array());
        assert_eq!(value["data"]["notes"][0][0], "ep1");
        assert!(value["data"]["lastPlayed"].is_null());
    }

    #[test]
    fn version_support() {
        assert!(is_supported_version("1.0.0"));
        assert!(is_supported_version("1.4"));
        assert!(!is_supported_version("2.0.0"));
        assert!(!is_supported_version("one"));
        assert!(!is_supported_version(""));
    }
}
