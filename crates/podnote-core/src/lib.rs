pub mod backup;
pub mod clock;
pub mod keyed;
pub mod patch;
pub mod types;

pub use backup::{
    is_supported_version, Backup, BackupData, SnapshotInfo, BACKUP_FILE_PREFIX, BACKUP_MAJOR,
    BACKUP_MIME, BACKUP_VERSION,
};
pub use keyed::Keyed;
pub use patch::{HistoryPatch, NotePatch, PatchError};
pub use types::*;
