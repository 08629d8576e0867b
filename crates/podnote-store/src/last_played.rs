use crate::backend::Backend;
use crate::codec::{self, keys};
use crate::error::Result;
use crate::store::{PodStore, Write};
use podnote_core::LastPlayed;

/// Single-slot resume pointer.
pub struct LastPlayedSlot<'a, B: Backend> {
    store: &'a mut PodStore<B>,
}

impl<B: Backend> PodStore<B> {
    pub fn last_played(&mut self) -> LastPlayedSlot<'_, B> {
        LastPlayedSlot { store: self }
    }
}

impl<B: Backend> LastPlayedSlot<'_, B> {
    /// Overwrite the slot with `episode_id` at `offset_ms`, stamped now.
    pub fn save(&mut self, episode_id: &str, offset_ms: u64) -> Result<LastPlayed> {
        let record = LastPlayed::now(episode_id, offset_ms);
        self.put(&record)?;
        Ok(record)
    }

    pub(crate) fn put(&mut self, record: &LastPlayed) -> Result<()> {
        let encoded = codec::encode(record)?;
        self.store
            .persist("last_played", |_| Ok(vec![Write::set(keys::LAST_PLAYED, encoded.clone())]))?;
        tracing::debug!(episode_id = %record.episode_id, offset_ms = record.offset_ms, "last played saved");
        Ok(())
    }

    pub fn load(&self) -> Result<Option<LastPlayed>> {
        self.store.read(keys::LAST_PLAYED)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.store.write_unchecked(&Write::remove(keys::LAST_PLAYED))
    }
}
