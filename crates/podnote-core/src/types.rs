use crate::clock::{self, de_millis};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use time::OffsetDateTime;

/// Default cap on the number of history items kept.
pub const DEFAULT_MAX_HISTORY: usize = 50;

/// One episode the listener has engaged with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    pub title: String,
    #[serde(alias = "podcastName")]
    pub show_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, alias = "duration", deserialize_with = "de_millis")]
    pub duration_ms: u64,
    /// Transcript segments as produced by the transcription service.
    #[serde(default)]
    pub transcript: Vec<serde_json::Value>,
    #[serde(default)]
    pub notes: Vec<Note>,
    pub created_at: String,
    pub last_played_at: String,
    #[serde(default, alias = "lastPosition", deserialize_with = "de_millis")]
    pub last_position_ms: u64,
}

impl HistoryItem {
    /// A fresh item stamped with the current time.
    pub fn new(id: impl Into<String>, title: impl Into<String>, show_name: impl Into<String>) -> Self {
        let now = clock::now_rfc3339();
        Self {
            id: id.into(),
            title: title.into(),
            show_name: show_name.into(),
            cover_image: None,
            duration_ms: 0,
            transcript: Vec::new(),
            notes: Vec::new(),
            created_at: now.clone(),
            last_played_at: now,
            last_position_ms: 0,
        }
    }

    pub fn last_played(&self) -> Option<OffsetDateTime> {
        clock::parse_rfc3339(&self.last_played_at)
    }
}

/// Most recently played first. Items with unparseable timestamps sort last,
/// keeping their relative order.
pub fn cmp_recency(a: &HistoryItem, b: &HistoryItem) -> Ordering {
    match (a.last_played(), b.last_played()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Note category. Fixed set; `thought` when unspecified.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteCategory {
    #[default]
    Thought,
    Question,
    Action,
    Quote,
}

impl NoteCategory {
    pub const ALL: [NoteCategory; 4] = [
        NoteCategory::Thought,
        NoteCategory::Question,
        NoteCategory::Action,
        NoteCategory::Quote,
    ];
}

impl std::fmt::Display for NoteCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoteCategory::Thought => write!(f, "thought"),
            NoteCategory::Question => write!(f, "question"),
            NoteCategory::Action => write!(f, "action"),
            NoteCategory::Quote => write!(f, "quote"),
        }
    }
}

impl std::str::FromStr for NoteCategory {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thought" => Ok(NoteCategory::Thought),
            "question" => Ok(NoteCategory::Question),
            "action" => Ok(NoteCategory::Action),
            "quote" => Ok(NoteCategory::Quote),
            _ => anyhow::bail!(
                "invalid note category: {s}. Expected: thought, question, action, quote"
            ),
        }
    }
}

/// A user annotation anchored to a position in an episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    #[serde(alias = "podcastId")]
    pub episode_id: String,
    /// Position within the episode.
    #[serde(default, alias = "timestamp", deserialize_with = "de_millis")]
    pub timestamp_ms: u64,
    /// Transcript text the note was taken on.
    #[serde(default, alias = "selectedText")]
    pub quote: String,
    #[serde(default, alias = "note")]
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: NoteCategory,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Caller-supplied fields for a new note.
#[derive(Debug, Clone, Default)]
pub struct NoteInput {
    pub timestamp_ms: u64,
    pub quote: String,
    pub text: String,
    pub tags: Vec<String>,
    pub category: Option<NoteCategory>,
}

impl Note {
    /// Build a note with a fresh `note_<ulid>` id and both timestamps set to now.
    pub fn new(episode_id: impl Into<String>, input: NoteInput) -> Self {
        let now = clock::now_rfc3339();
        Self {
            id: format!("note_{}", ulid::Ulid::new().to_string().to_lowercase()),
            episode_id: episode_id.into(),
            timestamp_ms: input.timestamp_ms,
            quote: input.quote,
            text: input.text,
            tags: input.tags,
            category: input.category.unwrap_or_default(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Singleton pointer to the most recent playback position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastPlayed {
    #[serde(alias = "podcastId")]
    pub episode_id: String,
    #[serde(alias = "time", deserialize_with = "de_millis")]
    pub offset_ms: u64,
    /// Wall-clock milliseconds of the save.
    pub timestamp: i64,
}

impl LastPlayed {
    pub fn now(episode_id: impl Into<String>, offset_ms: u64) -> Self {
        Self {
            episode_id: episode_id.into(),
            offset_ms,
            timestamp: clock::now_ms(),
        }
    }
}
