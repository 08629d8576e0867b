use crate::file_backend::DEFAULT_BACKEND_QUOTA;
use podnote_core::DEFAULT_MAX_HISTORY;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Soft ceiling the capacity manager enforces: 4.5 MiB, under the 5 MiB hard limit.
pub const DEFAULT_CEILING_BYTES: u64 = 4 * 1024 * 1024 + 512 * 1024;
pub const DEFAULT_RETENTION_DAYS: u32 = 30;
pub const DEFAULT_WARN_RATIO: f64 = 0.9;

/// Keys accepted in `config.json`.
pub const CONFIG_KEYS: [&str; 5] = [
    "ceiling_bytes",
    "retention_days",
    "max_history",
    "warn_ratio",
    "backend_quota_bytes",
];

/// Store tuning, injected at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub ceiling_bytes: u64,
    pub retention_days: u32,
    pub max_history: usize,
    /// Usage ratio above which the store reports itself near full.
    pub warn_ratio: f64,
    /// Hard limit handed to the file backend.
    pub backend_quota_bytes: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            ceiling_bytes: DEFAULT_CEILING_BYTES,
            retention_days: DEFAULT_RETENTION_DAYS,
            max_history: DEFAULT_MAX_HISTORY,
            warn_ratio: DEFAULT_WARN_RATIO,
            backend_quota_bytes: DEFAULT_BACKEND_QUOTA,
        }
    }
}

impl StoreConfig {
    /// Read `config.json`. Missing file or missing keys fall back to defaults;
    /// a malformed file is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_history == 0 {
            return Err(ConfigError::Invalid("max_history must be at least 1".into()));
        }
        if !(self.warn_ratio > 0.0 && self.warn_ratio <= 1.0) {
            return Err(ConfigError::Invalid(
                "warn_ratio must be in (0, 1]".into(),
            ));
        }
        if self.ceiling_bytes > self.backend_quota_bytes {
            return Err(ConfigError::Invalid(format!(
                "ceiling_bytes ({}) must not exceed backend_quota_bytes ({})",
                self.ceiling_bytes, self.backend_quota_bytes
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
