//! Directory creation, rename and delete.

use std::fs;
use std::io;

use tracing::info;

use super::error::{display_path, FileError};
use super::guard::{is_plain_name, join_relative, ConfinedPath, ServerRoots};
use super::metadata::{describe, FileItem};

/// Create a directory and any missing parents. Existing directories are fine.
pub fn create_dir(path: &ConfinedPath) -> Result<FileItem, FileError> {
    if let Ok(metadata) = fs::metadata(path.as_path()) {
        if !metadata.is_dir() {
            return Err(FileError::Conflict(display_path(path.relative())));
        }
    }

    fs::create_dir_all(path.as_path()).map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists | io::ErrorKind::NotADirectory => {
            FileError::Conflict(display_path(path.relative()))
        }
        _ => FileError::Io(e),
    })?;

    info!(path = %display_path(path.relative()), "Created directory");
    describe(path)
}

/// Rename an entry in place, keeping it in the same parent directory.
pub fn rename(
    roots: &ServerRoots,
    server_id: &str,
    old_path: &str,
    new_name: &str,
) -> Result<FileItem, FileError> {
    if !is_plain_name(new_name) {
        return Err(FileError::InvalidPath(new_name.to_string()));
    }

    let source = roots.confine(server_id, old_path)?;
    if source.is_root() {
        return Err(FileError::InvalidPath(display_path(old_path)));
    }

    // Confine the computed destination, then again from its own relative form
    let computed = roots.confine(server_id, &join_relative(source.parent_relative(), new_name))?;
    let target = roots.confine(server_id, computed.relative())?;

    fs::symlink_metadata(source.as_path()).map_err(|e| FileError::from_io(e, source.relative()))?;

    if fs::symlink_metadata(target.as_path()).is_ok() {
        return Err(FileError::Conflict(target.relative().to_string()));
    }

    fs::rename(source.as_path(), target.as_path())
        .map_err(|e| FileError::from_io(e, source.relative()))?;

    info!(
        server_id = %server_id,
        from = %source.relative(),
        to = %target.relative(),
        "Renamed entry"
    );
    describe(&target)
}

/// Delete a file, symlink or directory tree. Symlinks are never followed.
pub fn delete(path: &ConfinedPath) -> Result<(), FileError> {
    if path.is_root() {
        return Err(FileError::InvalidPath(display_path(path.relative())));
    }

    let metadata = fs::symlink_metadata(path.as_path())
        .map_err(|e| FileError::from_io(e, path.relative()))?;

    if metadata.is_dir() {
        fs::remove_dir_all(path.as_path())
    } else {
        fs::remove_file(path.as_path())
    }
    .map_err(|e| FileError::from_io(e, path.relative()))?;

    info!(path = %path.relative(), directory = metadata.is_dir(), "Deleted entry");
    Ok(())
}
