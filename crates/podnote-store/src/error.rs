use crate::backend::BackendError;
use podnote_core::PatchError;

/// Which part of a restore failed to commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStep {
    History,
    Notes,
    LastPlayed,
}

impl std::fmt::Display for RestoreStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestoreStep::History => write!(f, "history"),
            RestoreStep::Notes => write!(f, "notes"),
            RestoreStep::LastPlayed => write!(f, "last played"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A write would exceed the ceiling even after eviction ran.
    #[error(
        "storage full writing {collection}: needs {required} bytes of {ceiling} \
         ({evicted} old history item(s) already evicted); delete older items and retry"
    )]
    CapacityExceeded {
        collection: &'static str,
        required: u64,
        ceiling: u64,
        evicted: usize,
    },

    #[error("invalid backup: {0}")]
    InvalidBackupFormat(String),

    #[error(transparent)]
    InvalidPatch(#[from] PatchError),

    #[error("duplicate note id {note_id} in episode {episode_id}")]
    DuplicateNoteId { episode_id: String, note_id: String },

    /// A restore step failed; keys written by earlier steps were put back.
    #[error("restore failed at {step} step; previous data was kept")]
    Restore {
        step: RestoreStep,
        #[source]
        source: Box<StoreError>,
    },

    #[error("storage backend unavailable")]
    Backend(#[from] BackendError),

    #[error("failed to encode collection: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
