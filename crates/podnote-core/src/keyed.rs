use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// A map keyed by episode id whose serialized form is an association list
/// `[[key, value], ...]` rather than a JSON object.
///
/// Deserialization also accepts a JSON object so documents written with a
/// native map still load.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyed<V>(BTreeMap<String, V>);

impl<V> Default for Keyed<V> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<V> Keyed<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.0.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keep only the entries for which `keep` returns true. Returns the
    /// removed keys.
    pub fn retain_keys(&mut self, mut keep: impl FnMut(&str) -> bool) -> Vec<String> {
        let removed: Vec<String> = self.0.keys().filter(|k| !keep(k)).cloned().collect();
        for key in &removed {
            self.0.remove(key);
        }
        removed
    }
}

impl<V> FromIterator<(String, V)> for Keyed<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<V: Serialize> Serialize for Keyed<V> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(self.0.iter())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KeyedRepr<V> {
    Pairs(Vec<(String, V)>),
    Object(BTreeMap<String, V>),
}

impl<'de, V: DeserializeOwned> Deserialize<'de> for Keyed<V> {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        match KeyedRepr::<V>::deserialize(d)? {
            // Later duplicates win, matching `Map` construction from entries.
            KeyedRepr::Pairs(pairs) => Ok(pairs.into_iter().collect()),
            KeyedRepr::Object(map) => Ok(Self(map)),
        }
    }
}
