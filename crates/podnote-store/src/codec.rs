//! Collection codec: every collection is one JSON document under one key.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Backend keys owned by the store. Nothing else may write these.
pub mod keys {
    pub const HISTORY: &str = "podnote.history";
    pub const NOTES: &str = "podnote.notes";
    pub const LAST_PLAYED: &str = "podnote.last_played";
    pub const TRANSCRIPTS: &str = "podnote.transcripts";
    pub const CURRENT_EPISODE: &str = "podnote.current_episode";

    pub const ALL: [&str; 5] = [HISTORY, NOTES, LAST_PLAYED, TRANSCRIPTS, CURRENT_EPISODE];
}

pub fn encode<T: Serialize + ?Sized>(collection: &T) -> Result<String> {
    Ok(serde_json::to_string(collection)?)
}

/// Decode a stored collection. A missing payload is the empty value; a
/// malformed one is logged and also degrades to the empty value.
pub fn decode<T: DeserializeOwned + Default>(key: &str, raw: Option<&str>) -> T {
    let Some(raw) = raw else {
        return T::default();
    };
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, error = %e, bytes = raw.len(), "discarding undecodable collection");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podnote_core::{HistoryItem, Keyed, Note};

    #[test]
    fn missing_payload_is_empty() {
        let v: Vec<HistoryItem> = decode(keys::HISTORY, None);
        assert!(v.is_empty());
    }

    #[test]
    fn corrupt_payload_is_empty() {
        let v: Vec<HistoryItem> = decode(keys::HISTORY, Some("{{{ definitely not json"));
        assert!(v.is_empty());
        let v: Vec<HistoryItem> = decode(keys::HISTORY, Some(r#"{"id": "wrong shape"}"#));
        assert!(v.is_empty());
        let n: Keyed<Vec<Note>> = decode(keys::NOTES, Some("42"));
        assert!(n.is_empty());
        let lp: Option<podnote_core::LastPlayed> = decode(keys::LAST_PLAYED, Some("[]"));
        assert!(lp.is_none());
    }

    #[test]
    fn encode_decode_history() {
        let items = vec![HistoryItem::new("ep1", "One", "Show")];
        let text = encode(&items).unwrap();
        let back: Vec<HistoryItem> = decode(keys::HISTORY, Some(&text));
        assert_eq!(back, items);
    }
}
