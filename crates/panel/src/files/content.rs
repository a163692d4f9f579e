//! Text reads and atomic writes.
//!
//! Reads load the whole file into memory and are meant for the config editor,
//! so they are capped at [`MAX_TEXT_SIZE`]. Writes go to a temporary sibling
//! first and are renamed over the target, so a reader never sees a truncated
//! file.

use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use protocol::TEXT_ENCODING;
use tracing::warn;

use super::error::{display_path, FileError};
use super::guard::ConfinedPath;
use super::metadata::require_regular_file;

/// Largest file readable as text (5 MiB).
pub const MAX_TEXT_SIZE: u64 = 5 * 1024 * 1024;

/// Decoded text file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextContent {
    /// File contents. Invalid UTF-8 sequences are replaced.
    pub content: String,
    /// Always `utf-8`.
    pub encoding: &'static str,
}

/// Read a file as UTF-8 text.
pub fn read_text(path: &ConfinedPath) -> Result<TextContent, FileError> {
    let metadata = fs::metadata(path.as_path()).map_err(|e| FileError::from_io(e, path.relative()))?;

    require_regular_file(&metadata, path.relative())?;

    if metadata.len() > MAX_TEXT_SIZE {
        return Err(FileError::TooLarge {
            size: metadata.len(),
            limit: MAX_TEXT_SIZE,
        });
    }

    // Bound the read too, the file may have grown since the stat
    let file = fs::File::open(path.as_path()).map_err(|e| FileError::from_io(e, path.relative()))?;
    let mut buffer = Vec::with_capacity(metadata.len() as usize);
    file.take(MAX_TEXT_SIZE + 1).read_to_end(&mut buffer)?;

    if buffer.len() as u64 > MAX_TEXT_SIZE {
        return Err(FileError::TooLarge {
            size: buffer.len() as u64,
            limit: MAX_TEXT_SIZE,
        });
    }

    Ok(TextContent {
        content: String::from_utf8_lossy(&buffer).into_owned(),
        encoding: TEXT_ENCODING,
    })
}

/// Create or overwrite a file, creating missing parent directories.
pub fn write_file(path: &ConfinedPath, data: &[u8]) -> Result<(), FileError> {
    let target = path.as_path();

    if path.is_root() {
        return Err(FileError::IsADirectory(display_path(path.relative())));
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| match e.kind() {
            // A file sits where a parent directory should be
            std::io::ErrorKind::AlreadyExists | std::io::ErrorKind::NotADirectory => {
                FileError::NotADirectory(path.parent_relative().to_string())
            }
            _ => FileError::Io(e),
        })?;
    }

    let existing = fs::metadata(target).ok();
    if existing.as_ref().is_some_and(|m| m.is_dir()) {
        return Err(FileError::IsADirectory(display_path(path.relative())));
    }

    let temp_path = temp_sibling(target);
    if let Err(e) = write_temp(&temp_path, data, existing.as_ref()) {
        remove_temp(&temp_path);
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&temp_path, target) {
        remove_temp(&temp_path);
        return Err(e.into());
    }

    Ok(())
}

fn write_temp(
    temp_path: &Path,
    data: &[u8],
    existing: Option<&fs::Metadata>,
) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;

    // Keep the mode of the file being replaced
    if let Some(metadata) = existing {
        fs::set_permissions(temp_path, metadata.permissions())?;
    }
    Ok(())
}

fn remove_temp(temp_path: &Path) {
    if let Err(e) = fs::remove_file(temp_path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = ?temp_path, error = %e, "Failed to cleanup temp file after failed write");
        }
    }
}

/// Hidden temporary name next to `target`, on the same filesystem.
fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_name = format!(".{}.{:08x}.tmp", name, rand::random::<u32>());
    target.with_file_name(temp_name)
}
