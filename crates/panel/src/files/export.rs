//! Streaming exports: single file downloads and directory archives.
//!
//! Downloads stream the file in chunks starting at an optional offset, so an
//! interrupted download can be resumed. Archives are produced on the fly: a
//! blocking worker walks the directory and writes a zip into a bounded
//! channel, so nothing is staged on disk and memory stays proportional to the
//! channel depth. Dropping the returned stream stops the worker at its next
//! write.

use std::fs::File;
use std::io::{self, SeekFrom, Write};
use std::path::Path;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use tokio::io::AsyncSeekExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::error::{display_path, FileError};
use super::guard::ConfinedPath;
use super::metadata::require_regular_file;

/// Default chunk size for streamed bodies (64KB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Default deflate level for archives.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Chunks buffered between the archive worker and the consumer.
const ARCHIVE_CHANNEL_DEPTH: usize = 8;

/// A stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// An open single-file download.
pub struct FileDownload {
    /// Suggested attachment name.
    pub file_name: String,
    /// Full size of the file.
    pub size: u64,
    /// Offset the stream starts at.
    pub offset: u64,
    /// File contents from `offset` to the end.
    pub stream: ByteStream,
}

impl FileDownload {
    /// Bytes the stream will yield.
    pub fn remaining(&self) -> u64 {
        self.size - self.offset
    }
}

impl std::fmt::Debug for FileDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDownload")
            .field("file_name", &self.file_name)
            .field("size", &self.size)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

/// An archive being produced.
pub struct ArchiveDownload {
    /// Suggested attachment name, `<directory>.zip`.
    pub file_name: String,
    /// Zip bytes.
    pub stream: ByteStream,
}

impl std::fmt::Debug for ArchiveDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveDownload")
            .field("file_name", &self.file_name)
            .finish_non_exhaustive()
    }
}

/// Open a regular file for streaming from `offset`.
pub async fn open_download(
    path: &ConfinedPath,
    offset: u64,
    chunk_size: usize,
) -> Result<FileDownload, FileError> {
    let metadata = tokio::fs::metadata(path.as_path())
        .await
        .map_err(|e| FileError::from_io(e, path.relative()))?;

    require_regular_file(&metadata, path.relative())?;

    let size = metadata.len();
    if offset > size {
        return Err(FileError::InvalidOffset { offset, size });
    }

    let mut file = tokio::fs::File::open(path.as_path())
        .await
        .map_err(|e| FileError::from_io(e, path.relative()))?;
    if offset > 0 {
        file.seek(SeekFrom::Start(offset)).await?;
    }

    debug!(path = %path.relative(), size, offset, "Opened download");

    Ok(FileDownload {
        file_name: path.file_name(),
        size,
        offset,
        stream: Box::pin(ReaderStream::with_capacity(file, chunk_size)),
    })
}

/// Start streaming a zip archive of a directory.
///
/// Every entry is stored under a top-level folder named after the directory.
/// Must be called from within a tokio runtime.
pub async fn open_archive(
    dir: &ConfinedPath,
    compression_level: u32,
    chunk_size: usize,
) -> Result<ArchiveDownload, FileError> {
    let metadata = tokio::fs::metadata(dir.as_path())
        .await
        .map_err(|e| FileError::from_io(e, dir.relative()))?;
    if !metadata.is_dir() {
        return Err(FileError::NotADirectory(display_path(dir.relative())));
    }

    let top = dir.file_name();
    let file_name = format!("{top}.zip");
    let source = dir.as_path().to_path_buf();
    let relative = dir.relative().to_string();

    let (tx, rx) = mpsc::channel(ARCHIVE_CHANNEL_DEPTH);

    tokio::task::spawn_blocking(move || {
        let mut sink = ChannelWriter::new(tx.clone(), chunk_size);
        match write_archive(&source, &top, compression_level, &mut sink) {
            Ok(entries) => {
                info!(path = %display_path(&relative), entries, "Archive complete");
            }
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                info!(path = %display_path(&relative), "Archive download abandoned by receiver");
            }
            Err(e) => {
                warn!(path = %display_path(&relative), error = %e, "Archive failed");
                // Receiver may already be gone
                let _ = tx.blocking_send(Err(e));
            }
        }
    });

    Ok(ArchiveDownload {
        file_name,
        stream: Box::pin(ReceiverStream::new(rx)),
    })
}

/// Write `source` as a zip into `sink`, returning the number of entries.
fn write_archive(
    source: &Path,
    top: &str,
    compression_level: u32,
    sink: &mut ChannelWriter,
) -> io::Result<usize> {
    let mut zip = ZipWriter::new_stream(&mut *sink);

    match write_entries(&mut zip, source, top, entry_options(compression_level)) {
        Ok(entries) => {
            zip.finish().map_err(zip_to_io)?;
            sink.flush()?;
            Ok(entries)
        }
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            // The sink discards writes once disconnected, so this only
            // settles the writer before it is dropped.
            let _ = zip.finish();
            Err(e)
        }
        Err(e) => Err(e),
    }
}

fn write_entries<W: Write + io::Seek>(
    zip: &mut ZipWriter<W>,
    source: &Path,
    top: &str,
    options: SimpleFileOptions,
) -> io::Result<usize> {
    let mut entries = 0;

    let walker = WalkDir::new(source)
        .follow_links(false)
        .sort_by_file_name();

    for entry_result in walker {
        let entry = match entry_result {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry in archive");
                continue;
            }
        };

        let rest = match entry.path().strip_prefix(source) {
            Ok(rest) => rest,
            Err(_) => continue,
        };
        let mut name = top.to_string();
        for segment in rest.iter() {
            name.push('/');
            name.push_str(&segment.to_string_lossy());
        }

        let file_type = entry.file_type();
        if file_type.is_dir() {
            zip.add_directory(format!("{name}/"), options)
                .map_err(zip_to_io)?;
            entries += 1;
        } else if file_type.is_file() {
            let mut file = match File::open(entry.path()) {
                Ok(f) => f,
                Err(e) => {
                    warn!(path = ?entry.path(), error = %e, "Skipping unreadable file in archive");
                    continue;
                }
            };
            let len = file.metadata().map(|m| m.len()).unwrap_or(0);
            zip.start_file(name, options.large_file(len >= u32::MAX as u64))
                .map_err(zip_to_io)?;
            io::copy(&mut file, zip)?;
            entries += 1;
        } else {
            debug!(path = ?entry.path(), "Skipping symlink or special file in archive");
        }
    }

    Ok(entries)
}

fn entry_options(compression_level: u32) -> SimpleFileOptions {
    if compression_level == 0 {
        SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
    } else {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(i64::from(compression_level.min(9))))
    }
}

fn zip_to_io(err: ZipError) -> io::Error {
    match err {
        ZipError::Io(e) => e,
        other => io::Error::other(other),
    }
}

/// Blocking writer that forwards buffered chunks into an async channel.
///
/// The first write after the receiving side is dropped fails with
/// `BrokenPipe`. Anything written after that is discarded.
struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
    buffer: BytesMut,
    chunk_size: usize,
    disconnected: bool,
}

impl ChannelWriter {
    fn new(tx: mpsc::Sender<io::Result<Bytes>>, chunk_size: usize) -> Self {
        Self {
            tx,
            buffer: BytesMut::with_capacity(chunk_size),
            chunk_size,
            disconnected: false,
        }
    }

    fn disconnect(&mut self) -> io::Error {
        self.disconnected = true;
        self.buffer.clear();
        io::Error::new(io::ErrorKind::BrokenPipe, "archive receiver dropped")
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.disconnected || self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = self.buffer.split().freeze();
        if self.tx.blocking_send(Ok(chunk)).is_err() {
            return Err(self.disconnect());
        }
        Ok(())
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.disconnected {
            return Ok(data.len());
        }
        if self.tx.is_closed() {
            return Err(self.disconnect());
        }
        self.buffer.extend_from_slice(data);
        if self.buffer.len() >= self.chunk_size {
            self.send_buffered()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffered()
    }
}
