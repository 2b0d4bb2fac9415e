//! OS-aware path detection for Quill storage.
//!
//! - **Windows**: `%APPDATA%\Quill\`
//! - **macOS**: `~/Library/Application Support/Quill/`
//! - **Linux**: `~/.local/share/Quill/`
//!
//! `QUILL_DATA_DIR` overrides the platform location.

use std::path::PathBuf;
use tracing::debug;

use crate::error::{Result, StorageError};

/// Application name used for storage directories.
pub const APP_NAME: &str = "Quill";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "QUILL_DATA_DIR";

/// Subdirectory holding one file per stored key.
pub const STORE_DIR: &str = "store";
pub const EXPORTS_DIR: &str = "exports";

/// Quill storage paths container.
#[derive(Debug, Clone)]
pub struct QuillPaths {
    /// Root data directory (platform-specific).
    pub data_dir: PathBuf,
    /// Key-value store directory.
    pub store_dir: PathBuf,
    /// Default destination for exported outlines.
    pub exports_dir: PathBuf,
}

impl QuillPaths {
    /// Create QuillPaths with automatic OS detection.
    pub fn new() -> Result<Self> {
        let data_dir = quill_data_dir()?;
        Ok(Self::from_root(data_dir))
    }

    /// Create QuillPaths from a custom root directory.
    pub fn from_root(data_dir: PathBuf) -> Self {
        Self {
            store_dir: data_dir.join(STORE_DIR),
            exports_dir: data_dir.join(EXPORTS_DIR),
            data_dir,
        }
    }

    /// Ensure all directories exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.store_dir)?;
        std::fs::create_dir_all(&self.exports_dir)?;
        debug!(data_dir = %self.data_dir.display(), "Quill storage directories initialized");
        Ok(())
    }
}

/// Get the Quill data directory based on the current OS.
pub fn quill_data_dir() -> Result<PathBuf> {
    if let Ok(val) = std::env::var(DATA_DIR_ENV) {
        if !val.is_empty() {
            let path = PathBuf::from(val);
            debug!(path = %path.display(), "Using QUILL_DATA_DIR override");
            return Ok(path);
        }
    }

    let base = dirs::data_dir().ok_or(StorageError::HomeDirNotFound)?;
    Ok(base.join(APP_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_structure() {
        let paths = QuillPaths::from_root(PathBuf::from("/tmp/quill-test"));
        assert!(paths.store_dir.ends_with(STORE_DIR));
        assert!(paths.exports_dir.ends_with(EXPORTS_DIR));
        assert!(paths.store_dir.starts_with(&paths.data_dir));
    }

    #[test]
    fn test_ensure_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = QuillPaths::from_root(tmp.path().join("data"));
        paths.ensure_dirs().unwrap();
        assert!(paths.store_dir.is_dir());
        assert!(paths.exports_dir.is_dir());
    }
}
