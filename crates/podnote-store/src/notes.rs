use crate::backend::Backend;
use crate::codec::keys;
use crate::error::{Result, StoreError};
use crate::evict::keyed_write;
use crate::store::PodStore;
use podnote_core::{clock, Keyed, Note, NoteCategory, NoteInput, NotePatch};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Every episode's notes, one physical collection.
pub type NoteMap = Keyed<Vec<Note>>;

/// Per-episode note lists. Each save rewrites the whole table.
pub struct NotesTable<'a, B: Backend> {
    store: &'a mut PodStore<B>,
}

impl<B: Backend> PodStore<B> {
    pub fn notes(&mut self) -> NotesTable<'_, B> {
        NotesTable { store: self }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoteSortKey {
    #[default]
    CreatedAt,
    UpdatedAt,
    Timestamp,
}

impl std::str::FromStr for NoteSortKey {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "created" | "createdAt" => Ok(NoteSortKey::CreatedAt),
            "updated" | "updatedAt" => Ok(NoteSortKey::UpdatedAt),
            "timestamp" => Ok(NoteSortKey::Timestamp),
            _ => Err(format!(
                "invalid sort key: {s}. Expected: created, updated, timestamp"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Predicates for [`NotesTable::filter`]. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct NoteFilter {
    pub category: Option<NoteCategory>,
    /// Matches notes sharing at least one tag.
    pub tags: Vec<String>,
    /// Case-insensitive substring over note text and quoted text.
    pub search: Option<String>,
    pub sort_by: NoteSortKey,
    pub order: SortOrder,
}

impl NoteFilter {
    pub fn category(category: NoteCategory) -> Self {
        Self {
            category: Some(category),
            ..Default::default()
        }
    }

    pub fn matches(&self, note: &Note) -> bool {
        if let Some(cat) = self.category {
            if note.category != cat {
                return false;
            }
        }
        if !self.tags.is_empty() && !note.tags.iter().any(|t| self.tags.contains(t)) {
            return false;
        }
        if let Some(needle) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let needle = needle.to_lowercase();
            if !note.text.to_lowercase().contains(&needle)
                && !note.quote.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }

    /// Filter and sort in memory. Ties keep their original order.
    pub fn apply(&self, notes: Vec<Note>) -> Vec<Note> {
        let mut out: Vec<Note> = notes.into_iter().filter(|n| self.matches(n)).collect();
        out.sort_by(|a, b| {
            let ord = match self.sort_by {
                NoteSortKey::CreatedAt => cmp_ts(&a.created_at, &b.created_at),
                NoteSortKey::UpdatedAt => cmp_ts(&a.updated_at, &b.updated_at),
                NoteSortKey::Timestamp => a.timestamp_ms.cmp(&b.timestamp_ms),
            };
            match self.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        out
    }
}

fn cmp_ts(a: &str, b: &str) -> Ordering {
    match (clock::parse_rfc3339(a), clock::parse_rfc3339(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub thought: usize,
    pub question: usize,
    pub action: usize,
    pub quote: usize,
}

impl CategoryCounts {
    fn bump(&mut self, category: NoteCategory) {
        match category {
            NoteCategory::Thought => self.thought += 1,
            NoteCategory::Question => self.question += 1,
            NoteCategory::Action => self.action += 1,
            NoteCategory::Quote => self.quote += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteStats {
    pub total: usize,
    pub by_category: CategoryCounts,
    /// Five most recently created notes across all episodes.
    pub recent: Vec<Note>,
}

impl<B: Backend> NotesTable<'_, B> {
    /// Replace an episode's note list. An empty list removes the episode.
    pub fn save(&mut self, episode_id: &str, notes: Vec<Note>) -> Result<()> {
        let mut seen = HashSet::new();
        for note in &notes {
            if !seen.insert(note.id.as_str()) {
                return Err(StoreError::DuplicateNoteId {
                    episode_id: episode_id.to_string(),
                    note_id: note.id.clone(),
                });
            }
        }
        let count = notes.len();
        self.store.persist("notes", |s| {
            let mut table: NoteMap = s.read(keys::NOTES)?;
            if notes.is_empty() {
                table.remove(episode_id);
            } else {
                table.insert(episode_id, notes.clone());
            }
            Ok(vec![keyed_write(keys::NOTES, &table)?])
        })?;
        tracing::info!(episode_id, count, "notes saved");
        Ok(())
    }

    /// Notes for one episode in stored (creation) order.
    pub fn load(&self, episode_id: &str) -> Result<Vec<Note>> {
        let table: NoteMap = self.store.read(keys::NOTES)?;
        Ok(table.get(episode_id).cloned().unwrap_or_default())
    }

    pub fn all(&self) -> Result<NoteMap> {
        self.store.read(keys::NOTES)
    }

    /// Pure query over one episode's notes.
    pub fn filter(&self, episode_id: &str, filter: &NoteFilter) -> Result<Vec<Note>> {
        Ok(filter.apply(self.load(episode_id)?))
    }

    pub fn add(&mut self, episode_id: &str, input: NoteInput) -> Result<Note> {
        let note = Note::new(episode_id, input);
        let mut notes = self.load(episode_id)?;
        notes.push(note.clone());
        self.save(episode_id, notes)?;
        Ok(note)
    }

    /// Patch one note. Returns the updated note, or `None` if it does not exist.
    pub fn update(
        &mut self,
        episode_id: &str,
        note_id: &str,
        patch: NotePatch,
    ) -> Result<Option<Note>> {
        let mut notes = self.load(episode_id)?;
        let Some(note) = notes.iter_mut().find(|n| n.id == note_id) else {
            return Ok(None);
        };
        patch.apply(note)?;
        let updated = note.clone();
        self.save(episode_id, notes)?;
        Ok(Some(updated))
    }

    pub fn delete(&mut self, episode_id: &str, note_id: &str) -> Result<bool> {
        let mut notes = self.load(episode_id)?;
        let before = notes.len();
        notes.retain(|n| n.id != note_id);
        if notes.len() == before {
            return Ok(false);
        }
        self.save(episode_id, notes)?;
        Ok(true)
    }

    pub fn stats(&self) -> Result<NoteStats> {
        let mut all: Vec<Note> = self.all()?.values().flatten().cloned().collect();
        let mut by_category = CategoryCounts::default();
        for note in &all {
            by_category.bump(note.category);
        }
        all.sort_by(|a, b| cmp_ts(&b.created_at, &a.created_at));
        let total = all.len();
        all.truncate(5);
        Ok(NoteStats {
            total,
            by_category,
            recent: all,
        })
    }
}
