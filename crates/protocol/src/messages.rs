//! Protocol message definitions for CraftPanel file management.
//!
//! This module defines the request and response types exchanged between the
//! request layer and the file core. Messages are carried in an [`Envelope`]
//! and can be encoded as MessagePack or JSON.
//!
//! Every request names the server it targets and a client-relative path using
//! forward slashes. Requests are checked with [`Message::validate`] before they
//! reach the file core, so malformed shapes are rejected up front.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Longest client path or name accepted in a request.
pub const MAX_PATH_LENGTH: usize = 4096;

/// Encoding reported for every text read.
pub const TEXT_ENCODING: &str = "utf-8";

/// Envelope wrapper for all protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol version for compatibility checking.
    pub version: u8,
    /// Sequence number used to pair replies with requests.
    pub sequence: u64,
    /// The actual message payload.
    pub payload: Message,
}

impl Envelope {
    /// Create a new envelope with the current protocol version.
    pub fn new(sequence: u64, payload: Message) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            sequence,
            payload,
        }
    }

    /// Wrap a reply so it carries the sequence number of the request.
    pub fn reply_to(&self, payload: Message) -> Self {
        Self::new(self.sequence, payload)
    }

    /// Reject envelopes produced by a different protocol version.
    pub fn check_version(&self) -> Result<()> {
        if self.version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                got: self.version,
            });
        }
        Ok(())
    }
}

/// Top-level message enum containing all message types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Message {
    // Requests
    /// List the immediate children of a directory.
    FileListRequest(FileListRequest),
    /// Describe a single file or directory.
    FileStatRequest(FileStatRequest),
    /// Read a text file.
    FileReadRequest(FileReadRequest),
    /// Create or overwrite a file.
    FileWriteRequest(FileWriteRequest),
    /// Create a directory chain.
    DirectoryCreateRequest(DirectoryCreateRequest),
    /// Rename an entry within its parent directory.
    FileRenameRequest(FileRenameRequest),
    /// Delete a file or directory tree.
    FileDeleteRequest(FileDeleteRequest),
    /// Stream a single file.
    FileDownloadRequest(FileDownloadRequest),
    /// Stream a directory as a zip archive.
    ArchiveDownloadRequest(ArchiveDownloadRequest),
    /// Upload one or more files.
    FileUploadRequest(FileUploadRequest),

    // Responses
    /// Directory listing.
    FileListResponse(FileListResponse),
    /// Single entry description.
    FileStatResponse(FileStatResponse),
    /// Text file contents.
    FileReadResponse(FileReadResponse),
    /// Upload outcome counts.
    FileUploadResponse(FileUploadResponse),
    /// A mutation finished successfully.
    OperationComplete(OperationComplete),
    /// Error message.
    Error(ErrorMessage),
}

impl Message {
    /// Whether this message is a request the file core can serve.
    pub fn is_request(&self) -> bool {
        !matches!(
            self,
            Message::FileListResponse(_)
                | Message::FileStatResponse(_)
                | Message::FileReadResponse(_)
                | Message::FileUploadResponse(_)
                | Message::OperationComplete(_)
                | Message::Error(_)
        )
    }

    /// Check required fields and size limits of a request.
    ///
    /// Path confinement is not decided here; this only rejects shapes the
    /// file core should never see.
    pub fn validate(&self) -> Result<()> {
        match self {
            Message::FileListRequest(req) => validate_target(&req.server_id, &req.path),
            Message::FileStatRequest(req) => validate_target(&req.server_id, &req.path),
            Message::FileReadRequest(req) => validate_target(&req.server_id, &req.path),
            Message::FileWriteRequest(req) => {
                validate_target(&req.server_id, &req.path)?;
                require_non_empty("path", &req.path)
            }
            Message::DirectoryCreateRequest(req) => {
                validate_target(&req.server_id, &req.path)?;
                require_non_empty("path", &req.path)
            }
            Message::FileRenameRequest(req) => {
                validate_target(&req.server_id, &req.path)?;
                require_non_empty("path", &req.path)?;
                require_non_empty("new_name", &req.new_name)?;
                check_length("new_name", &req.new_name)
            }
            Message::FileDeleteRequest(req) => {
                validate_target(&req.server_id, &req.path)?;
                require_non_empty("path", &req.path)
            }
            Message::FileDownloadRequest(req) => {
                validate_target(&req.server_id, &req.path)?;
                require_non_empty("path", &req.path)
            }
            Message::ArchiveDownloadRequest(req) => validate_target(&req.server_id, &req.path),
            Message::FileUploadRequest(req) => {
                validate_target(&req.server_id, &req.destination)?;
                if req.files.is_empty() {
                    return Err(ProtocolError::InvalidRequest(
                        "upload carries no files".to_string(),
                    ));
                }
                for file in &req.files {
                    require_non_empty("file_name", &file.file_name)?;
                    check_length("file_name", &file.file_name)?;
                    if let Some(relative) = &file.relative_path {
                        check_length("relative_path", relative)?;
                    }
                }
                Ok(())
            }
            other => Err(ProtocolError::InvalidRequest(format!(
                "{} is not a request",
                other.kind()
            ))),
        }
    }

    /// Short name of the message variant, for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::FileListRequest(_) => "FileListRequest",
            Message::FileStatRequest(_) => "FileStatRequest",
            Message::FileReadRequest(_) => "FileReadRequest",
            Message::FileWriteRequest(_) => "FileWriteRequest",
            Message::DirectoryCreateRequest(_) => "DirectoryCreateRequest",
            Message::FileRenameRequest(_) => "FileRenameRequest",
            Message::FileDeleteRequest(_) => "FileDeleteRequest",
            Message::FileDownloadRequest(_) => "FileDownloadRequest",
            Message::ArchiveDownloadRequest(_) => "ArchiveDownloadRequest",
            Message::FileUploadRequest(_) => "FileUploadRequest",
            Message::FileListResponse(_) => "FileListResponse",
            Message::FileStatResponse(_) => "FileStatResponse",
            Message::FileReadResponse(_) => "FileReadResponse",
            Message::FileUploadResponse(_) => "FileUploadResponse",
            Message::OperationComplete(_) => "OperationComplete",
            Message::Error(_) => "Error",
        }
    }
}

fn validate_target(server_id: &str, path: &str) -> Result<()> {
    require_non_empty("server_id", server_id)?;
    check_length("server_id", server_id)?;
    check_length("path", path)
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ProtocolError::InvalidRequest(format!("{field} is empty")));
    }
    Ok(())
}

fn check_length(field: &str, value: &str) -> Result<()> {
    if value.len() > MAX_PATH_LENGTH {
        return Err(ProtocolError::InvalidRequest(format!(
            "{field} exceeds {MAX_PATH_LENGTH} bytes"
        )));
    }
    if value.contains('\0') {
        return Err(ProtocolError::InvalidRequest(format!(
            "{field} contains a NUL byte"
        )));
    }
    Ok(())
}

// ============================================================================
// Request Messages
// ============================================================================

/// Request to list files in a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListRequest {
    /// Target server.
    pub server_id: String,
    /// Directory to list, relative to the server root. Empty means the root.
    #[serde(default)]
    pub path: String,
}

/// Request to describe one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatRequest {
    /// Target server.
    pub server_id: String,
    /// Entry to describe.
    #[serde(default)]
    pub path: String,
}

/// Request to read a text file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReadRequest {
    /// Target server.
    pub server_id: String,
    /// File to read.
    pub path: String,
}

/// Content carried by a write request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteContent {
    /// UTF-8 text, typically from the config editor.
    Text(String),
    /// Arbitrary bytes.
    Binary(#[serde(with = "serde_bytes")] Vec<u8>),
}

impl WriteContent {
    /// Raw bytes to write.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            WriteContent::Text(text) => text.as_bytes(),
            WriteContent::Binary(bytes) => bytes,
        }
    }

    /// Consume into raw bytes without copying.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            WriteContent::Text(text) => text.into_bytes(),
            WriteContent::Binary(bytes) => bytes,
        }
    }
}

/// Request to create or overwrite a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileWriteRequest {
    /// Target server.
    pub server_id: String,
    /// File to write. Missing parent directories are created.
    pub path: String,
    /// New contents.
    pub content: WriteContent,
}

/// Request to create a directory chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryCreateRequest {
    /// Target server.
    pub server_id: String,
    /// Directory to create.
    pub path: String,
}

/// Request to rename an entry within its parent directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRenameRequest {
    /// Target server.
    pub server_id: String,
    /// Entry to rename.
    pub path: String,
    /// New base name. Must not contain separators.
    pub new_name: String,
}

/// Request to delete an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDeleteRequest {
    /// Target server.
    pub server_id: String,
    /// Entry to delete. Directories are removed recursively.
    pub path: String,
}

/// Request to download a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDownloadRequest {
    /// Target server.
    pub server_id: String,
    /// File to download.
    pub path: String,
    /// Starting offset (for resuming).
    #[serde(default)]
    pub offset: u64,
}

/// Request to download a directory as a zip archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveDownloadRequest {
    /// Target server.
    pub server_id: String,
    /// Directory to archive. Empty means the server root.
    #[serde(default)]
    pub path: String,
}

/// One uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFile {
    /// Path declared by the client to preserve folder structure.
    #[serde(default)]
    pub relative_path: Option<String>,
    /// Original file name, used when no relative path is declared.
    pub file_name: String,
    /// File contents.
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

/// Request to upload files into a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUploadRequest {
    /// Target server.
    pub server_id: String,
    /// Destination directory, relative to the server root.
    #[serde(default)]
    pub destination: String,
    /// Files to write.
    pub files: Vec<UploadFile>,
}

// ============================================================================
// Response Messages
// ============================================================================

/// A single file or directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Base name.
    pub name: String,
    /// Path relative to the server root, forward slashes.
    pub path: String,
    /// Whether the entry is a directory.
    pub is_directory: bool,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modified timestamp (Unix epoch milliseconds).
    pub modified: u64,
    /// Lowercase extension without the dot.
    pub extension: Option<String>,
}

/// Response with directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListResponse {
    /// Directory that was listed.
    pub path: String,
    /// Entries, directories first.
    pub entries: Vec<FileEntry>,
    /// Entries that could not be described and were left out.
    pub skipped: u32,
}

/// Response describing a single entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatResponse {
    /// The entry.
    pub entry: FileEntry,
}

/// Response with text file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReadResponse {
    /// File that was read.
    pub path: String,
    /// Decoded text.
    pub content: String,
    /// Always [`TEXT_ENCODING`].
    pub encoding: String,
}

/// Response to an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUploadResponse {
    /// Files written.
    pub uploaded: u32,
    /// Files that failed.
    pub errors: u32,
}

/// A mutation finished successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationComplete {
    /// Path affected by the operation (the new path for renames).
    pub path: String,
}

/// Error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Error code for programmatic handling.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Optional context (e.g. the request kind or path).
    pub context: Option<String>,
}

/// Error codes for file management failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Path escapes the server root or a name is malformed.
    InvalidPath,
    /// Target does not exist.
    NotFound,
    /// Expected a directory, found a file.
    NotADirectory,
    /// Expected a file, found a directory.
    IsADirectory,
    /// Read size ceiling or upload limit exceeded.
    TooLarge,
    /// Destination already exists.
    Conflict,
    /// Request shape or parameters are invalid.
    InvalidRequest,
    /// Server-side error.
    InternalError,
}

// ============================================================================
// Serialization helpers
// ============================================================================

impl Envelope {
    /// Serialize the envelope to MessagePack bytes.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Deserialize an envelope from MessagePack bytes.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Serialize the envelope to JSON, as spoken by the browser UI.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize an envelope from JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(server_id: &str, path: &str) -> Message {
        Message::FileListRequest(FileListRequest {
            server_id: server_id.to_string(),
            path: path.to_string(),
        })
    }

    #[test]
    fn test_envelope_version() {
        let envelope = Envelope::new(1, list("srv1", ""));
        assert_eq!(envelope.version, PROTOCOL_VERSION);
        assert!(envelope.check_version().is_ok());
    }

    #[test]
    fn test_envelope_version_mismatch() {
        let mut envelope = Envelope::new(1, list("srv1", ""));
        envelope.version = PROTOCOL_VERSION + 1;
        assert!(matches!(
            envelope.check_version(),
            Err(ProtocolError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_reply_keeps_sequence() {
        let request = Envelope::new(77, list("srv1", "config"));
        let reply = request.reply_to(Message::OperationComplete(OperationComplete {
            path: "config".to_string(),
        }));
        assert_eq!(reply.sequence, 77);
    }

    #[test]
    fn test_msgpack_roundtrip_upload() {
        let envelope = Envelope::new(
            3,
            Message::FileUploadRequest(FileUploadRequest {
                server_id: "srv1".to_string(),
                destination: "plugins".to_string(),
                files: vec![UploadFile {
                    relative_path: Some("Essentials/config.yml".to_string()),
                    file_name: "config.yml".to_string(),
                    data: (0u8..=255).collect(),
                }],
            }),
        );
        let bytes = envelope.to_msgpack().unwrap();
        assert_eq!(Envelope::from_msgpack(&bytes).unwrap(), envelope);
    }

    #[test]
    fn test_json_shape_is_tagged() {
        let envelope = Envelope::new(1, list("srv1", "world"));
        let json = envelope.to_json().unwrap();
        assert!(json.contains("\"type\":\"FileListRequest\""));
        assert!(json.contains("\"server_id\":\"srv1\""));
    }

    #[test]
    fn test_json_missing_path_defaults_to_root() {
        let json = r#"{"version":1,"sequence":5,"payload":{"type":"FileListRequest","data":{"server_id":"srv1"}}}"#;
        let envelope = Envelope::from_json(json).unwrap();
        assert_eq!(envelope.payload, list("srv1", ""));
    }

    #[test]
    fn test_json_malformed_shape_rejected() {
        // new_name is required for renames
        let json = r#"{"version":1,"sequence":5,"payload":{"type":"FileRenameRequest","data":{"server_id":"srv1","path":"a.txt"}}}"#;
        assert!(matches!(
            Envelope::from_json(json),
            Err(ProtocolError::Deserialization(_))
        ));
    }

    #[test]
    fn test_write_content_bytes() {
        assert_eq!(WriteContent::Text("hi".to_string()).as_bytes(), b"hi");
        assert_eq!(WriteContent::Binary(vec![1, 2]).as_bytes(), &[1, 2]);
        assert_eq!(WriteContent::Text("hi".to_string()).into_bytes(), b"hi".to_vec());
    }

    #[test]
    fn test_validate_list_root() {
        assert!(list("srv1", "").validate().is_ok());
    }

    #[test]
    fn test_validate_empty_server_id() {
        assert!(matches!(
            list("", "config").validate(),
            Err(ProtocolError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_validate_nul_in_path() {
        assert!(list("srv1", "a\0b").validate().is_err());
    }

    #[test]
    fn test_validate_overlong_path() {
        let path = "a/".repeat(MAX_PATH_LENGTH);
        assert!(list("srv1", &path).validate().is_err());
    }

    #[test]
    fn test_validate_rename_requires_name() {
        let msg = Message::FileRenameRequest(FileRenameRequest {
            server_id: "srv1".to_string(),
            path: "notes.txt".to_string(),
            new_name: "  ".to_string(),
        });
        assert!(msg.validate().is_err());
    }

    #[test]
    fn test_validate_delete_requires_path() {
        let msg = Message::FileDeleteRequest(FileDeleteRequest {
            server_id: "srv1".to_string(),
            path: String::new(),
        });
        assert!(msg.validate().is_err());
    }

    #[test]
    fn test_validate_upload_without_files() {
        let msg = Message::FileUploadRequest(FileUploadRequest {
            server_id: "srv1".to_string(),
            destination: String::new(),
            files: vec![],
        });
        assert!(msg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_responses() {
        let msg = Message::OperationComplete(OperationComplete {
            path: "x".to_string(),
        });
        assert!(!msg.is_request());
        assert!(msg.validate().is_err());
    }

    #[test]
    fn test_error_roundtrip() {
        let envelope = Envelope::new(
            9,
            Message::Error(ErrorMessage {
                code: ErrorCode::Conflict,
                message: "already exists: draft.txt".to_string(),
                context: Some("FileRenameRequest".to_string()),
            }),
        );
        let bytes = envelope.to_msgpack().unwrap();
        assert_eq!(Envelope::from_msgpack(&bytes).unwrap(), envelope);
    }
}
