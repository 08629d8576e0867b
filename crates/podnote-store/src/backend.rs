use std::collections::BTreeMap;

/// Failure reported by a [`Backend`].
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend's own hard limit rejected the write.
    #[error("backend quota exceeded writing {key}: {required} bytes needed, limit {limit}")]
    QuotaExceeded {
        key: String,
        required: u64,
        limit: u64,
    },
    #[error("backend I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backing store is corrupt: {0}")]
    Corrupt(String),
}

/// A synchronous textual key-value store with no transactions.
///
/// The store only ever talks to persistence through these four primitives,
/// so any keyed string store can sit underneath it.
pub trait Backend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Write `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<(), BackendError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&mut self, key: &str) -> Result<(), BackendError>;

    fn keys(&self) -> Result<Vec<String>, BackendError>;
}

/// Bytes used by a key-value map, counted as key length plus value length.
pub(crate) fn used_bytes(entries: &BTreeMap<String, String>) -> u64 {
    entries
        .iter()
        .map(|(k, v)| (k.len() + v.len()) as u64)
        .sum()
}

/// Check a pending write against a hard quota.
pub(crate) fn check_quota(
    entries: &BTreeMap<String, String>,
    quota: Option<u64>,
    key: &str,
    value: &str,
) -> Result<(), BackendError> {
    let Some(limit) = quota else {
        return Ok(());
    };
    let current = entries
        .get(key)
        .map(|v| (key.len() + v.len()) as u64)
        .unwrap_or(0);
    let required = used_bytes(entries) - current + (key.len() + value.len()) as u64;
    if required > limit {
        return Err(BackendError::QuotaExceeded {
            key: key.to_string(),
            required,
            limit,
        });
    }
    Ok(())
}

/// In-memory backend with an optional hard quota.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    entries: BTreeMap<String, String>,
    quota: Option<u64>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that rejects writes taking it past `quota` bytes.
    pub fn with_quota(quota: u64) -> Self {
        Self {
            entries: BTreeMap::new(),
            quota: Some(quota),
        }
    }

    pub fn used_bytes(&self) -> u64 {
        used_bytes(&self.entries)
    }
}

impl Backend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), BackendError> {
        check_quota(&self.entries, self.quota, key, value)?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), BackendError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let mut b = MemoryBackend::new();
        b.set("k", "v").unwrap();
        assert_eq!(b.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(b.keys().unwrap(), vec!["k".to_string()]);
        b.remove("k").unwrap();
        assert_eq!(b.get("k").unwrap(), None);
        b.remove("k").unwrap();
    }

    #[test]
    fn quota_counts_replacement_not_sum() {
        let mut b = MemoryBackend::with_quota(10);
        b.set("k", "12345678").unwrap();
        // Replacing the value frees the old bytes first.
        b.set("k", "abcdefgh").unwrap();
        b.set("k", "123456789").unwrap();
        assert_eq!(b.used_bytes(), 10);

        let err = b.set("k", "1234567890").unwrap_err();
        assert!(matches!(
            err,
            BackendError::QuotaExceeded {
                required: 11,
                limit: 10,
                ..
            }
        ));
        assert!(b.set("x", "y").is_err());
        assert_eq!(b.get("k").unwrap().as_deref(), Some("123456789"));
    }
}
