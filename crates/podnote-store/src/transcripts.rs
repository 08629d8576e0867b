use crate::backend::Backend;
use crate::codec::keys;
use crate::error::Result;
use crate::evict::keyed_write;
use crate::store::PodStore;
use podnote_core::Keyed;
use serde_json::Value;

/// Cached transcript segments per episode. Segment shape is opaque here.
pub type TranscriptMap = Keyed<Vec<Value>>;

/// Handle over the transcript cache. Entries only live as long as some
/// history item references the episode; the retention sweep drops orphans.
pub struct TranscriptCache<'a, B: Backend> {
    store: &'a mut PodStore<B>,
}

impl<B: Backend> PodStore<B> {
    pub fn transcripts(&mut self) -> TranscriptCache<'_, B> {
        TranscriptCache { store: self }
    }
}

impl<B: Backend> TranscriptCache<'_, B> {
    pub fn save(&mut self, episode_id: &str, segments: Vec<Value>) -> Result<()> {
        let count = segments.len();
        self.store.persist("transcripts", |s| {
            let mut map: TranscriptMap = s.read(keys::TRANSCRIPTS)?;
            map.insert(episode_id, segments.clone());
            Ok(vec![keyed_write(keys::TRANSCRIPTS, &map)?])
        })?;
        tracing::debug!(episode_id, segments = count, "transcript cached");
        Ok(())
    }

    pub fn load(&self, episode_id: &str) -> Result<Option<Vec<Value>>> {
        let map: TranscriptMap = self.store.read(keys::TRANSCRIPTS)?;
        Ok(map.get(episode_id).cloned())
    }

    /// Drop one cached transcript. Returns whether anything was removed.
    pub fn remove(&mut self, episode_id: &str) -> Result<bool> {
        let mut map: TranscriptMap = self.store.read(keys::TRANSCRIPTS)?;
        if map.remove(episode_id).is_none() {
            return Ok(false);
        }
        let write = keyed_write(keys::TRANSCRIPTS, &map)?;
        self.store.write_unchecked(&write)?;
        Ok(true)
    }

    pub fn episode_ids(&self) -> Result<Vec<String>> {
        let map: TranscriptMap = self.store.read(keys::TRANSCRIPTS)?;
        Ok(map.keys().map(str::to_string).collect())
    }
}
