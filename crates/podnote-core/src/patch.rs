//! Tagged-field updates.
//!
//! A patch names exactly the fields it changes. Parsing rejects unknown
//! fields and wrong types; `validate` checks the merged result before
//! anything is applied.

use crate::clock::{self, de_millis};
use crate::types::{HistoryItem, Note, NoteCategory};
use serde::Deserializer;

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("malformed patch: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("patch sets no fields")]
    Empty,
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn de_opt_millis<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    de_millis(d).map(Some)
}

/// Field-level update for a [`HistoryItem`]. `id`, `createdAt` and
/// `lastPlayedAt` are not patchable; the ledger stamps the latter itself.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HistoryPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "podcastName")]
    pub show_name: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default, alias = "duration", deserialize_with = "de_opt_millis")]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub transcript: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub notes: Option<Vec<Note>>,
    #[serde(default, alias = "lastPosition", deserialize_with = "de_opt_millis")]
    pub last_position_ms: Option<u64>,
}

impl HistoryPatch {
    pub fn from_json(s: &str) -> Result<Self, PatchError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn position(last_position_ms: u64) -> Self {
        Self {
            last_position_ms: Some(last_position_ms),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Check the patch against the item it will be merged into.
    pub fn validate(&self, target: &HistoryItem) -> Result<(), PatchError> {
        if self.is_empty() {
            return Err(PatchError::Empty);
        }
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(PatchError::Invalid {
                    field: "title",
                    reason: "must not be blank".into(),
                });
            }
        }
        if let Some(show) = &self.show_name {
            if show.trim().is_empty() {
                return Err(PatchError::Invalid {
                    field: "showName",
                    reason: "must not be blank".into(),
                });
            }
        }
        let duration = self.duration_ms.unwrap_or(target.duration_ms);
        if let Some(pos) = self.last_position_ms {
            if duration > 0 && pos > duration {
                return Err(PatchError::Invalid {
                    field: "lastPositionMs",
                    reason: format!("{pos} is past the end of the episode ({duration})"),
                });
            }
        }
        if let Some(notes) = &self.notes {
            if let Some(stray) = notes.iter().find(|n| n.episode_id != target.id) {
                return Err(PatchError::Invalid {
                    field: "notes",
                    reason: format!("note {} belongs to episode {}", stray.id, stray.episode_id),
                });
            }
        }
        Ok(())
    }

    /// Validate, then merge into `target`.
    pub fn apply(self, target: &mut HistoryItem) -> Result<(), PatchError> {
        self.validate(target)?;
        if let Some(v) = self.title {
            target.title = v;
        }
        if let Some(v) = self.show_name {
            target.show_name = v;
        }
        if let Some(v) = self.cover_image {
            target.cover_image = Some(v);
        }
        if let Some(v) = self.duration_ms {
            target.duration_ms = v;
        }
        if let Some(v) = self.transcript {
            target.transcript = v;
        }
        if let Some(v) = self.notes {
            target.notes = v;
        }
        if let Some(v) = self.last_position_ms {
            target.last_position_ms = v;
        }
        Ok(())
    }
}

/// Field-level update for a [`Note`].
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NotePatch {
    #[serde(default, alias = "timestamp", deserialize_with = "de_opt_millis")]
    pub timestamp_ms: Option<u64>,
    #[serde(default, alias = "selectedText")]
    pub quote: Option<String>,
    #[serde(default, alias = "note")]
    pub text: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub category: Option<NoteCategory>,
}

impl NotePatch {
    pub fn from_json(s: &str) -> Result<Self, PatchError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Validate and merge into `target`, refreshing `updated_at`.
    pub fn apply(self, target: &mut Note) -> Result<(), PatchError> {
        if self.is_empty() {
            return Err(PatchError::Empty);
        }
        if let Some(tags) = &self.tags {
            if tags.iter().any(|t| t.trim().is_empty()) {
                return Err(PatchError::Invalid {
                    field: "tags",
                    reason: "tags must not be blank".into(),
                });
            }
        }
        if let Some(v) = self.timestamp_ms {
            target.timestamp_ms = v;
        }
        if let Some(v) = self.quote {
            target.quote = v;
        }
        if let Some(v) = self.text {
            target.text = v;
        }
        if let Some(v) = self.tags {
            target.tags = v;
        }
        if let Some(v) = self.category {
            target.category = v;
        }
        target.updated_at = clock::now_rfc3339();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NoteInput;

    #[test]
    fn unknown_fields_are_rejected() {
        let err = HistoryPatch::from_json(r#"{"title":"x","bogus":1}"#).unwrap_err();
        assert!(matches!(err, PatchError::Parse(_)));
        assert!(HistoryPatch::from_json(r#"{"id":"other"}"#).is_err());
        assert!(HistoryPatch::from_json(r#"{"lastPlayedAt":"2024-01-01T00:00:00Z"}"#).is_err());
    }

    #[test]
    fn wrong_types_are_rejected() {
        assert!(HistoryPatch::from_json(r#"{"title":5}"#).is_err());
        assert!(NotePatch::from_json(r#"{"category":"idea"}"#).is_err());
    }

    #[test]
    fn history_patch_merges_named_fields_only() {
        let mut item = HistoryItem::new("ep1", "Old", "Show");
        item.duration_ms = 10_000;
        let patch = HistoryPatch::from_json(r#"{"title":"New","lastPosition":2500.2}"#).unwrap();
        patch.apply(&mut item).unwrap();
        assert_eq!(item.title, "New");
        assert_eq!(item.show_name, "Show");
        assert_eq!(item.last_position_ms, 2500);
    }

    #[test]
    fn history_patch_validation() {
        let mut item = HistoryItem::new("ep1", "Old", "Show");
        item.duration_ms = 1_000;
        assert!(matches!(
            HistoryPatch::default().validate(&item),
            Err(PatchError::Empty)
        ));
        assert!(HistoryPatch::position(5_000).validate(&item).is_err());
        let blank = HistoryPatch {
            title: Some("  ".into()),
            ..Default::default()
        };
        assert!(blank.validate(&item).is_err());

        let stray = Note::new("ep2", NoteInput::default());
        let patch = HistoryPatch {
            notes: Some(vec![stray]),
            ..Default::default()
        };
        assert!(patch.validate(&item).is_err());
    }

    #[test]
    fn note_patch_refreshes_updated_at() {
        let mut note = Note::new("ep1", NoteInput::default());
        note.updated_at = "2000-01-01T00:00:00Z".into();
        NotePatch::from_json(r#"{"note":"edited","category":"question"}"#)
            .unwrap()
            .apply(&mut note)
            .unwrap();
        assert_eq!(note.text, "edited");
        assert_eq!(note.category, NoteCategory::Question);
        assert_ne!(note.updated_at, "2000-01-01T00:00:00Z");
    }
}
