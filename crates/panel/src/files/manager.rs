//! Async facade over the file core.
//!
//! [`FileManager`] confines every request and runs the blocking filesystem
//! work on tokio's blocking pool. It holds no mutable state and is cheap to
//! clone into request handlers.

use std::io;
use std::sync::Arc;

use tokio::task;
use tracing::info;

use super::browser::{list_directory, Listing};
use super::content::{read_text, write_file, TextContent};
use super::error::{display_path, FileError};
use super::export::{
    open_archive, open_download, ArchiveDownload, FileDownload, DEFAULT_CHUNK_SIZE,
    DEFAULT_COMPRESSION_LEVEL,
};
use super::guard::ServerRoots;
use super::ingest::{ingest_batch, ingest_one, IngestReport, UploadItem, DEFAULT_MAX_UPLOAD_SIZE};
use super::metadata::{describe, FileItem};
use super::ops;
use crate::config::FilesConfig;

/// Tunables for exports and uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSettings {
    /// Deflate level for archives, 0 stores entries uncompressed.
    pub compression_level: u32,
    /// Size of streamed body chunks.
    pub chunk_size: usize,
    /// Largest accepted upload item.
    pub max_upload_size: u64,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }
}

/// Per-server file operations.
#[derive(Debug, Clone)]
pub struct FileManager {
    roots: Arc<ServerRoots>,
    settings: FileSettings,
}

impl FileManager {
    /// Create a manager with default settings.
    pub fn new(roots: ServerRoots) -> Self {
        Self::with_settings(roots, FileSettings::default())
    }

    /// Create a manager with explicit settings.
    pub fn with_settings(roots: ServerRoots, settings: FileSettings) -> Self {
        Self {
            roots: Arc::new(roots),
            settings,
        }
    }

    /// Build from the `[files]` configuration section.
    pub fn from_config(config: &FilesConfig) -> io::Result<Self> {
        let roots = ServerRoots::new(&config.servers_dir)?.with_global_id(&config.global_server_id);
        Ok(Self::with_settings(
            roots,
            FileSettings {
                compression_level: config.archive_compression_level,
                chunk_size: config.stream_chunk_size,
                max_upload_size: config.max_upload_size,
            },
        ))
    }

    /// Server roots used for confinement.
    pub fn roots(&self) -> &ServerRoots {
        &self.roots
    }

    /// Active settings.
    pub fn settings(&self) -> FileSettings {
        self.settings
    }

    /// List a directory.
    pub async fn list(&self, server_id: &str, path: &str) -> Result<Listing, FileError> {
        let dir = self.roots.confine(server_id, path)?;
        blocking(move || list_directory(&dir)).await
    }

    /// Describe a single entry.
    pub async fn stat(&self, server_id: &str, path: &str) -> Result<FileItem, FileError> {
        let target = self.roots.confine(server_id, path)?;
        blocking(move || describe(&target)).await
    }

    /// Read a file as text.
    pub async fn read_text(&self, server_id: &str, path: &str) -> Result<TextContent, FileError> {
        let target = self.roots.confine(server_id, path)?;
        blocking(move || read_text(&target)).await
    }

    /// Write text to a file, replacing it atomically.
    pub async fn write_text(
        &self,
        server_id: &str,
        path: &str,
        content: String,
    ) -> Result<(), FileError> {
        self.write_bytes(server_id, path, content.into_bytes()).await
    }

    /// Write raw bytes to a file, replacing it atomically.
    pub async fn write_bytes(
        &self,
        server_id: &str,
        path: &str,
        data: Vec<u8>,
    ) -> Result<(), FileError> {
        let target = self.roots.confine(server_id, path)?;
        let size = data.len();
        let relative = target.relative().to_string();
        blocking(move || write_file(&target, &data)).await?;
        info!(server_id = %server_id, path = %relative, size, "Wrote file");
        Ok(())
    }

    /// Create a directory and its parents.
    pub async fn mkdir(&self, server_id: &str, path: &str) -> Result<FileItem, FileError> {
        let target = self.roots.confine(server_id, path)?;
        blocking(move || ops::create_dir(&target)).await
    }

    /// Rename an entry within its directory.
    pub async fn rename(
        &self,
        server_id: &str,
        path: &str,
        new_name: &str,
    ) -> Result<FileItem, FileError> {
        let roots = Arc::clone(&self.roots);
        let (server_id, path, new_name) = (server_id.to_string(), path.to_string(), new_name.to_string());
        blocking(move || ops::rename(&roots, &server_id, &path, &new_name)).await
    }

    /// Delete a file or directory tree.
    pub async fn delete(&self, server_id: &str, path: &str) -> Result<(), FileError> {
        let target = self.roots.confine(server_id, path)?;
        blocking(move || ops::delete(&target)).await
    }

    /// Stream a file from `offset`.
    pub async fn download(
        &self,
        server_id: &str,
        path: &str,
        offset: u64,
    ) -> Result<FileDownload, FileError> {
        let target = self.roots.confine(server_id, path)?;
        open_download(&target, offset, self.settings.chunk_size).await
    }

    /// Stream a directory as a zip archive.
    pub async fn archive(&self, server_id: &str, path: &str) -> Result<ArchiveDownload, FileError> {
        let dir = self.roots.confine(server_id, path)?;
        info!(server_id = %server_id, path = %display_path(dir.relative()), "Starting archive");
        open_archive(&dir, self.settings.compression_level, self.settings.chunk_size).await
    }

    /// Store one uploaded file below `destination`. Returns its relative path.
    pub async fn upload(
        &self,
        server_id: &str,
        destination: &str,
        item: UploadItem,
    ) -> Result<String, FileError> {
        let roots = Arc::clone(&self.roots);
        let (server_id, destination) = (server_id.to_string(), destination.to_string());
        let max = self.settings.max_upload_size;
        blocking(move || ingest_one(&roots, &server_id, &destination, &item, max)).await
    }

    /// Store many uploaded files, continuing past failures.
    pub async fn upload_batch(
        &self,
        server_id: &str,
        destination: &str,
        items: Vec<UploadItem>,
    ) -> Result<IngestReport, FileError> {
        let roots = Arc::clone(&self.roots);
        let (server_id, destination) = (server_id.to_string(), destination.to_string());
        let max = self.settings.max_upload_size;
        blocking(move || Ok(ingest_batch(&roots, &server_id, &destination, &items, max))).await
    }
}

/// Run filesystem work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, FileError>
where
    F: FnOnce() -> Result<T, FileError> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(work)
        .await
        .map_err(|e| FileError::Io(io::Error::other(e)))?
}
