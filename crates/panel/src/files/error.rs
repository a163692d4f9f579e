//! Error taxonomy for the file core.
//!
//! Messages only ever carry client-relative paths so absolute server paths are
//! not leaked back to the browser.

use std::io;

use protocol::ErrorCode;
use thiserror::Error;

/// Errors returned by file operations.
#[derive(Debug, Error)]
pub enum FileError {
    /// Path escapes the server root, or a name is malformed.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Target does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Expected a directory, found something else.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file, found a directory.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Expected a regular file, found a FIFO, socket or device.
    #[error("not a regular file: {0}")]
    NotAFile(String),

    /// Size ceiling exceeded.
    #[error("file too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    /// Destination already exists.
    #[error("already exists: {0}")]
    Conflict(String),

    /// Download offset lies past the end of the file.
    #[error("invalid offset {offset} for file of size {size}")]
    InvalidOffset { offset: u64, size: u64 },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FileError {
    /// Map an IO error on `path`, turning `NotFound` into the typed variant.
    pub(crate) fn from_io(err: io::Error, path: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => FileError::NotFound(display_path(path)),
            _ => FileError::Io(err),
        }
    }

    /// Wire error code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            FileError::InvalidPath(_) => ErrorCode::InvalidPath,
            FileError::NotFound(_) => ErrorCode::NotFound,
            FileError::NotADirectory(_) => ErrorCode::NotADirectory,
            FileError::IsADirectory(_) => ErrorCode::IsADirectory,
            FileError::NotAFile(_) => ErrorCode::InvalidRequest,
            FileError::TooLarge { .. } => ErrorCode::TooLarge,
            FileError::Conflict(_) => ErrorCode::Conflict,
            FileError::InvalidOffset { .. } => ErrorCode::InvalidRequest,
            FileError::Io(_) => ErrorCode::InternalError,
        }
    }
}

/// Render a client-relative path for messages; the root shows as `/`.
pub(crate) fn display_path(relative: &str) -> String {
    if relative.is_empty() {
        "/".to_string()
    } else {
        relative.to_string()
    }
}
