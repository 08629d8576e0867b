use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory.
pub const HOME_ENV: &str = "PODNOTE_HOME";

/// All well-known paths under a podnote data directory.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub root: PathBuf,
    pub store_json: PathBuf,
    pub config_json: PathBuf,
    pub lock_file: PathBuf,
}

impl StorePaths {
    /// Derive all paths from a data directory. Pure computation, no I/O.
    pub fn discover(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            store_json: root.join("store.json"),
            config_json: root.join("config.json"),
            lock_file: root.join("LOCK"),
            root,
        }
    }

    /// `$PODNOTE_HOME`, else the per-user data dir, else `~/.podnote`.
    pub fn default_root() -> PathBuf {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            PathBuf::from(home)
        } else if let Some(data_dir) = dirs::data_dir() {
            data_dir.join("podnote")
        } else if let Some(home) = dirs::home_dir() {
            home.join(".podnote")
        } else {
            PathBuf::from(".podnote")
        }
    }

    /// Create the data directory. Idempotent.
    pub fn ensure_layout(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }
}

/// Atomic write: write to a temp file in the same dir, then rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("no parent dir for {}", path.display()),
        )
    })?;
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_builds_correct_paths() {
        let p = StorePaths::discover("/tmp/podnote");
        assert_eq!(p.store_json, PathBuf::from("/tmp/podnote/store.json"));
        assert_eq!(p.config_json, PathBuf::from("/tmp/podnote/config.json"));
        assert_eq!(p.lock_file, PathBuf::from("/tmp/podnote/LOCK"));
    }

    #[test]
    fn default_root_is_not_empty() {
        assert!(!StorePaths::default_root().as_os_str().is_empty());
    }

    #[test]
    fn write_atomic_replaces_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("f.json");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
    }
}
