use crate::backend::Backend;
use crate::codec::{self, keys};
use crate::error::Result;
use crate::store::{PodStore, Write};
use serde_json::Value;

/// The episode the player currently has open, stored as an opaque document.
pub struct CurrentEpisode<'a, B: Backend> {
    store: &'a mut PodStore<B>,
}

impl<B: Backend> PodStore<B> {
    pub fn current_episode(&mut self) -> CurrentEpisode<'_, B> {
        CurrentEpisode { store: self }
    }
}

impl<B: Backend> CurrentEpisode<'_, B> {
    pub fn save(&mut self, episode: &Value) -> Result<()> {
        let encoded = codec::encode(episode)?;
        self.store
            .persist("current_episode", |_| {
                Ok(vec![Write::set(keys::CURRENT_EPISODE, encoded.clone())])
            })?;
        Ok(())
    }

    pub fn load(&self) -> Result<Option<Value>> {
        let value: Option<Value> = self.store.read(keys::CURRENT_EPISODE)?;
        Ok(value.filter(|v| !v.is_null()))
    }

    pub fn clear(&mut self) -> Result<()> {
        self.store.write_unchecked(&Write::remove(keys::CURRENT_EPISODE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::config::StoreConfig;
    use serde_json::json;

    #[test]
    fn save_load_clear() {
        let mut store = PodStore::new(MemoryBackend::new(), StoreConfig::default());
        assert_eq!(store.current_episode().load().unwrap(), None);
        let ep = json!({"id": "ep1", "title": "Pilot", "audioUrl": "https://example.invalid/a.mp3"});
        store.current_episode().save(&ep).unwrap();
        assert_eq!(store.current_episode().load().unwrap(), Some(ep));
        store.current_episode().clear().unwrap();
        assert_eq!(store.current_episode().load().unwrap(), None);
    }
}
