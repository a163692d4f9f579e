//! Uploads of one or many files into a destination directory.

use bytes::Bytes;
use tracing::{info, warn};

use super::content::write_file;
use super::error::FileError;
use super::guard::{join_relative, ServerRoots};

/// Default upper bound on a single uploaded item (1 GiB).
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 1024 * 1024 * 1024;

/// One uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
    /// File contents.
    pub data: Bytes,
    /// Path below the destination declared by the client, used for folder uploads.
    pub relative_path: Option<String>,
    /// Original file name, used when no relative path is declared.
    pub file_name: String,
}

impl UploadItem {
    /// Upload of a single named file.
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            relative_path: None,
            file_name: file_name.into(),
        }
    }

    /// Place the file at a declared path below the destination.
    pub fn with_relative_path(mut self, relative_path: impl Into<String>) -> Self {
        self.relative_path = Some(relative_path.into());
        self
    }

    /// Declared path if present and non-empty, else the original name.
    pub fn effective_name(&self) -> &str {
        match self.relative_path.as_deref() {
            Some(path) if !path.is_empty() => path,
            _ => &self.file_name,
        }
    }
}

/// Outcome of a batch upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Items written.
    pub uploaded: usize,
    /// Items that failed.
    pub errors: usize,
}

/// Write one uploaded item below `destination`. Returns its relative path.
pub fn ingest_one(
    roots: &ServerRoots,
    server_id: &str,
    destination: &str,
    item: &UploadItem,
    max_size: u64,
) -> Result<String, FileError> {
    let name = item.effective_name();
    if name.trim_matches(['/', '\\']).is_empty() {
        return Err(FileError::InvalidPath(name.to_string()));
    }

    let size = item.data.len() as u64;
    if size > max_size {
        return Err(FileError::TooLarge {
            size,
            limit: max_size,
        });
    }

    let path = roots.confine(server_id, &join_relative(destination, name))?;
    if path.is_root() {
        return Err(FileError::InvalidPath(name.to_string()));
    }

    write_file(&path, &item.data)?;
    Ok(path.relative().to_string())
}

/// Write every item independently; failures are counted and logged.
pub fn ingest_batch(
    roots: &ServerRoots,
    server_id: &str,
    destination: &str,
    items: &[UploadItem],
    max_size: u64,
) -> IngestReport {
    let mut report = IngestReport::default();

    for (index, item) in items.iter().enumerate() {
        match ingest_one(roots, server_id, destination, item, max_size) {
            Ok(_) => report.uploaded += 1,
            Err(e) => {
                warn!(
                    server_id = %server_id,
                    index,
                    name = %item.effective_name(),
                    error = %e,
                    "Upload item failed"
                );
                report.errors += 1;
            }
        }
    }

    info!(
        server_id = %server_id,
        destination = %destination,
        uploaded = report.uploaded,
        errors = report.errors,
        "Batch upload finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ServerRoots) {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("srv1/mc-data")).unwrap();
        let roots = ServerRoots::new(temp_dir.path()).unwrap();
        (temp_dir, roots)
    }

    #[test]
    fn test_ingest_one_uses_file_name() {
        let (temp_dir, roots) = setup();
        let item = UploadItem::new("EssentialsX.jar", &b"jar bytes"[..]);

        let path = ingest_one(&roots, "srv1", "plugins", &item, DEFAULT_MAX_UPLOAD_SIZE).unwrap();

        assert_eq!(path, "plugins/EssentialsX.jar");
        let on_disk = temp_dir.path().join("srv1/mc-data/plugins/EssentialsX.jar");
        assert_eq!(fs::read(on_disk).unwrap(), b"jar bytes");
    }

    #[test]
    fn test_ingest_one_prefers_relative_path() {
        let (temp_dir, roots) = setup();
        let item = UploadItem::new("r.0.0.mca", &b"region"[..]).with_relative_path("world/region/r.0.0.mca");

        let path = ingest_one(&roots, "srv1", "", &item, DEFAULT_MAX_UPLOAD_SIZE).unwrap();

        assert_eq!(path, "world/region/r.0.0.mca");
        assert!(temp_dir.path().join("srv1/mc-data/world/region/r.0.0.mca").is_file());
    }

    #[test]
    fn test_ingest_one_empty_relative_path_falls_back() {
        let (_temp_dir, roots) = setup();
        let item = UploadItem::new("ops.json", &b"[]"[..]).with_relative_path("");

        let path = ingest_one(&roots, "srv1", "/", &item, DEFAULT_MAX_UPLOAD_SIZE).unwrap();
        assert_eq!(path, "ops.json");
    }

    #[test]
    fn test_ingest_one_rejects_escape_and_empty() {
        let (_temp_dir, roots) = setup();

        let escape = UploadItem::new("x", &b"x"[..]).with_relative_path("../../../evil.sh");
        assert!(matches!(
            ingest_one(&roots, "srv1", "plugins", &escape, DEFAULT_MAX_UPLOAD_SIZE),
            Err(FileError::InvalidPath(_))
        ));

        let empty = UploadItem::new("", &b"x"[..]);
        assert!(matches!(
            ingest_one(&roots, "srv1", "plugins", &empty, DEFAULT_MAX_UPLOAD_SIZE),
            Err(FileError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_ingest_one_too_large() {
        let (temp_dir, roots) = setup();
        let item = UploadItem::new("big.bin", vec![0u8; 11]);

        let result = ingest_one(&roots, "srv1", "", &item, 10);

        assert!(matches!(result, Err(FileError::TooLarge { size: 11, limit: 10 })));
        assert!(!temp_dir.path().join("srv1/mc-data/big.bin").exists());
    }

    #[test]
    fn test_batch_counts_failures() {
        let (temp_dir, roots) = setup();
        let items = vec![
            UploadItem::new("one.txt", &b"1"[..]),
            UploadItem::new("two.txt", &b"2"[..]),
            UploadItem::new("three.txt", &b"3"[..]).with_relative_path("../../../three.txt"),
            UploadItem::new("four.txt", &b"4"[..]),
            UploadItem::new("five.txt", &b"5"[..]),
        ];

        let report = ingest_batch(&roots, "srv1", "uploads", &items, DEFAULT_MAX_UPLOAD_SIZE);

        assert_eq!(report, IngestReport { uploaded: 4, errors: 1 });
        let dir = temp_dir.path().join("srv1/mc-data/uploads");
        for name in ["one.txt", "two.txt", "four.txt", "five.txt"] {
            assert!(dir.join(name).is_file(), "{name} should exist");
        }
        assert!(!temp_dir.path().join("three.txt").exists());
    }

    #[test]
    fn test_batch_empty() {
        let (_temp_dir, roots) = setup();
        let report = ingest_batch(&roots, "srv1", "", &[], DEFAULT_MAX_UPLOAD_SIZE);
        assert_eq!(report, IngestReport::default());
    }
}
