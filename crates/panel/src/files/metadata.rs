//! Uniform descriptors for filesystem entries.

use std::fs::{self, Metadata};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use protocol::messages::FileEntry;

use super::error::{display_path, FileError};
use super::guard::ConfinedPath;

/// A file or directory with metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    /// Entry name (not full path).
    pub name: String,
    /// Path relative to the server root, forward slashes.
    pub path: String,
    /// Whether this is a directory.
    pub is_directory: bool,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modified timestamp.
    pub modified: SystemTime,
    /// Lowercase extension without the dot. `None` for directories.
    pub extension: Option<String>,
}

impl FileItem {
    /// Build an item from already fetched metadata.
    pub fn from_metadata(name: String, path: String, metadata: &Metadata) -> Self {
        let is_directory = metadata.is_dir();
        let extension = if is_directory {
            None
        } else {
            extension_of(&name)
        };

        Self {
            name,
            path,
            is_directory,
            size: if is_directory { 0 } else { metadata.len() },
            modified: metadata.modified().unwrap_or(UNIX_EPOCH),
            extension,
        }
    }

    /// Convert to protocol FileEntry.
    pub fn to_protocol(&self) -> FileEntry {
        let modified = self
            .modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        FileEntry {
            name: self.name.clone(),
            path: self.path.clone(),
            is_directory: self.is_directory,
            size: self.size,
            modified,
            extension: self.extension.clone(),
        }
    }
}

/// Accept only regular files for reading.
///
/// Opening a FIFO blocks until a writer shows up, so special files are refused
/// up front.
pub(crate) fn require_regular_file(metadata: &Metadata, relative: &str) -> Result<(), FileError> {
    if metadata.is_dir() {
        return Err(FileError::IsADirectory(display_path(relative)));
    }
    if !metadata.is_file() {
        return Err(FileError::NotAFile(display_path(relative)));
    }
    Ok(())
}

/// Describe the entry at a confined path. Symlinks are followed.
pub fn describe(path: &ConfinedPath) -> Result<FileItem, FileError> {
    let metadata = fs::metadata(path.as_path()).map_err(|e| FileError::from_io(e, path.relative()))?;
    Ok(FileItem::from_metadata(
        path.file_name(),
        path.relative().to_string(),
        &metadata,
    ))
}

/// Lowercase extension of a file name, `None` when absent or empty.
///
/// Dotfiles such as `.bashrc` have no extension.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| !ext.is_empty())
}
