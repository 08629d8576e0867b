pub mod backend;
pub mod backup;
pub mod capacity;
pub mod codec;
pub mod config;
pub mod current;
pub mod error;
pub mod evict;
pub mod file_backend;
pub mod history;
pub mod last_played;
pub mod notes;
pub mod paths;
pub mod store;
pub mod transcripts;

pub use backend::{Backend, BackendError, MemoryBackend};
pub use backup::{export_as_text, import_from_text, BackupService};
pub use capacity::Usage;
pub use config::{ConfigError, StoreConfig, CONFIG_KEYS};
pub use current::CurrentEpisode;
pub use error::{RestoreStep, Result, StoreError};
pub use evict::{EvictionMode, EvictionReport};
pub use file_backend::{FileBackend, DEFAULT_BACKEND_QUOTA};
pub use history::HistoryLedger;
pub use last_played::LastPlayedSlot;
pub use notes::{CategoryCounts, NoteFilter, NoteMap, NoteSortKey, NoteStats, NotesTable, SortOrder};
pub use paths::{write_atomic, StorePaths, HOME_ENV};
pub use store::{PodStore, StoreStats};
pub use transcripts::{TranscriptCache, TranscriptMap};

/// Open the file-backed store rooted at `paths`, loading `config.json` if present.
pub fn open(paths: StorePaths) -> std::result::Result<PodStore<FileBackend>, OpenError> {
    paths.ensure_layout().map_err(BackendError::Io)?;
    let config = StoreConfig::load(&paths.config_json)?;
    let backend = FileBackend::open(paths, Some(config.backend_quota_bytes))?;
    Ok(PodStore::new(backend, config))
}

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}
