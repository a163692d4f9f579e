//! Message router for dispatching file requests to the file manager.
//!
//! This module provides the `MessageRouter` struct that receives protocol
//! messages from an authenticated caller, validates them and routes them to
//! the matching [`FileManager`] operation. Most requests produce a reply
//! message; downloads and archives produce a byte stream instead.

use bytes::Bytes;
use protocol::messages::{
    ArchiveDownloadRequest, DirectoryCreateRequest, ErrorMessage, FileDeleteRequest,
    FileDownloadRequest, FileListRequest, FileListResponse, FileReadRequest, FileReadResponse,
    FileRenameRequest, FileStatRequest, FileStatResponse, FileUploadRequest, FileUploadResponse,
    FileWriteRequest, Message, OperationComplete,
};
use protocol::{ErrorCode, ProtocolError};
use tracing::{debug, info, warn};

use crate::files::error::display_path;
use crate::files::{ByteStream, FileError, FileManager, UploadItem};

/// Identity of the caller a request is served for.
///
/// Authentication happens before the router; the principal is only carried
/// through for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// User name or account id.
    pub user: String,
}

impl Principal {
    /// Create a principal for `user`.
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}

/// Result type for router operations.
pub type RouterResult = Result<RouterOutput, RouterError>;

/// Errors that can occur during message routing.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// File operation error.
    #[error(transparent)]
    File(#[from] FileError),

    /// Invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A response message was sent where a request was expected.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(&'static str),
}

impl From<ProtocolError> for RouterError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidRequest(msg) => RouterError::InvalidRequest(msg),
            other => RouterError::InvalidRequest(other.to_string()),
        }
    }
}

impl RouterError {
    /// Wire error code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            RouterError::File(e) => e.code(),
            RouterError::InvalidRequest(_) | RouterError::UnexpectedMessage(_) => {
                ErrorCode::InvalidRequest
            }
        }
    }

    /// Convert the error to a protocol ErrorMessage.
    pub fn to_error_message(&self, context: Option<String>) -> ErrorMessage {
        ErrorMessage {
            code: self.code(),
            message: self.to_string(),
            context,
        }
    }
}

/// What the router produced for a request.
pub enum RouterOutput {
    /// A reply message.
    Reply(Message),
    /// A body to stream back as an attachment.
    Stream {
        /// Suggested attachment name.
        file_name: String,
        /// Bytes the stream will yield, when known up front.
        length: Option<u64>,
        /// The body.
        stream: ByteStream,
    },
}

impl RouterOutput {
    /// The reply message, if this is not a stream.
    pub fn into_reply(self) -> Option<Message> {
        match self {
            RouterOutput::Reply(message) => Some(message),
            RouterOutput::Stream { .. } => None,
        }
    }
}

impl std::fmt::Debug for RouterOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouterOutput::Reply(message) => f.debug_tuple("Reply").field(message).finish(),
            RouterOutput::Stream {
                file_name, length, ..
            } => f
                .debug_struct("Stream")
                .field("file_name", file_name)
                .field("length", length)
                .finish_non_exhaustive(),
        }
    }
}

/// Message router that dispatches file requests.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    /// File manager serving every request.
    files: FileManager,
}

impl MessageRouter {
    /// Create a new message router over a file manager.
    pub fn new(files: FileManager) -> Self {
        Self { files }
    }

    /// The file manager requests are routed to.
    pub fn files(&self) -> &FileManager {
        &self.files
    }

    /// Route a message, turning any failure into an `Error` reply.
    pub async fn handle(&self, message: Message, principal: &Principal) -> RouterOutput {
        let kind = message.kind();
        match self.route(message, principal).await {
            Ok(output) => output,
            Err(err) => {
                warn!(user = %principal.user, request = kind, error = %err, "Request failed");
                RouterOutput::Reply(Message::Error(err.to_error_message(Some(kind.to_string()))))
            }
        }
    }

    /// Validate and dispatch a request.
    pub async fn route(&self, message: Message, principal: &Principal) -> RouterResult {
        if !message.is_request() {
            debug!(kind = message.kind(), "Rejecting response message received as request");
            return Err(RouterError::UnexpectedMessage(message.kind()));
        }
        message.validate()?;

        debug!(user = %principal.user, request = message.kind(), "Routing request");

        match message {
            Message::FileListRequest(req) => self.handle_file_list(req).await,
            Message::FileStatRequest(req) => self.handle_file_stat(req).await,
            Message::FileReadRequest(req) => self.handle_file_read(req).await,
            Message::FileWriteRequest(req) => self.handle_file_write(req, principal).await,
            Message::DirectoryCreateRequest(req) => self.handle_mkdir(req, principal).await,
            Message::FileRenameRequest(req) => self.handle_file_rename(req, principal).await,
            Message::FileDeleteRequest(req) => self.handle_file_delete(req, principal).await,
            Message::FileDownloadRequest(req) => self.handle_file_download(req, principal).await,
            Message::ArchiveDownloadRequest(req) => {
                self.handle_archive_download(req, principal).await
            }
            Message::FileUploadRequest(req) => self.handle_file_upload(req, principal).await,
            other => Err(RouterError::UnexpectedMessage(other.kind())),
        }
    }

    // =========================================================================
    // Read Handlers
    // =========================================================================

    async fn handle_file_list(&self, req: FileListRequest) -> RouterResult {
        debug!(server_id = %req.server_id, path = %req.path, "Listing directory");

        let listing = self.files.list(&req.server_id, &req.path).await?;

        Ok(RouterOutput::Reply(Message::FileListResponse(FileListResponse {
            path: req.path,
            entries: listing.items.iter().map(|i| i.to_protocol()).collect(),
            skipped: u32::try_from(listing.skipped).unwrap_or(u32::MAX),
        })))
    }

    async fn handle_file_stat(&self, req: FileStatRequest) -> RouterResult {
        let item = self.files.stat(&req.server_id, &req.path).await?;
        Ok(RouterOutput::Reply(Message::FileStatResponse(FileStatResponse {
            entry: item.to_protocol(),
        })))
    }

    async fn handle_file_read(&self, req: FileReadRequest) -> RouterResult {
        debug!(server_id = %req.server_id, path = %req.path, "Reading file");

        let text = self.files.read_text(&req.server_id, &req.path).await?;
        Ok(RouterOutput::Reply(Message::FileReadResponse(FileReadResponse {
            path: req.path,
            content: text.content,
            encoding: text.encoding.to_string(),
        })))
    }

    async fn handle_file_download(
        &self,
        req: FileDownloadRequest,
        principal: &Principal,
    ) -> RouterResult {
        let download = self
            .files
            .download(&req.server_id, &req.path, req.offset)
            .await?;

        info!(
            user = %principal.user,
            server_id = %req.server_id,
            path = %req.path,
            offset = download.offset,
            size = download.size,
            "Streaming file download"
        );

        Ok(RouterOutput::Stream {
            file_name: download.file_name.clone(),
            length: Some(download.remaining()),
            stream: download.stream,
        })
    }

    async fn handle_archive_download(
        &self,
        req: ArchiveDownloadRequest,
        principal: &Principal,
    ) -> RouterResult {
        let archive = self.files.archive(&req.server_id, &req.path).await?;

        info!(
            user = %principal.user,
            server_id = %req.server_id,
            path = %display_path(&req.path),
            file_name = %archive.file_name,
            "Streaming archive download"
        );

        Ok(RouterOutput::Stream {
            file_name: archive.file_name,
            length: None,
            stream: archive.stream,
        })
    }

    // =========================================================================
    // Mutation Handlers
    // =========================================================================

    async fn handle_file_write(&self, req: FileWriteRequest, principal: &Principal) -> RouterResult {
        let data = req.content.into_bytes();
        let size = data.len();
        self.files.write_bytes(&req.server_id, &req.path, data).await?;

        info!(user = %principal.user, server_id = %req.server_id, path = %req.path, size, "File saved");
        Ok(complete(req.path))
    }

    async fn handle_mkdir(&self, req: DirectoryCreateRequest, principal: &Principal) -> RouterResult {
        let item = self.files.mkdir(&req.server_id, &req.path).await?;

        info!(user = %principal.user, server_id = %req.server_id, path = %item.path, "Directory created");
        Ok(complete(item.path))
    }

    async fn handle_file_rename(&self, req: FileRenameRequest, principal: &Principal) -> RouterResult {
        let item = self
            .files
            .rename(&req.server_id, &req.path, &req.new_name)
            .await?;

        info!(
            user = %principal.user,
            server_id = %req.server_id,
            from = %req.path,
            to = %item.path,
            "Entry renamed"
        );
        Ok(complete(item.path))
    }

    async fn handle_file_delete(&self, req: FileDeleteRequest, principal: &Principal) -> RouterResult {
        self.files.delete(&req.server_id, &req.path).await?;

        info!(user = %principal.user, server_id = %req.server_id, path = %req.path, "Entry deleted");
        Ok(complete(req.path))
    }

    async fn handle_file_upload(&self, req: FileUploadRequest, principal: &Principal) -> RouterResult {
        let items: Vec<UploadItem> = req
            .files
            .into_iter()
            .map(|file| UploadItem {
                data: Bytes::from(file.data),
                relative_path: file.relative_path,
                file_name: file.file_name,
            })
            .collect();
        let count = items.len();

        let report = self
            .files
            .upload_batch(&req.server_id, &req.destination, items)
            .await?;

        info!(
            user = %principal.user,
            server_id = %req.server_id,
            destination = %display_path(&req.destination),
            count,
            uploaded = report.uploaded,
            errors = report.errors,
            "Upload processed"
        );

        Ok(RouterOutput::Reply(Message::FileUploadResponse(FileUploadResponse {
            uploaded: u32::try_from(report.uploaded).unwrap_or(u32::MAX),
            errors: u32::try_from(report.errors).unwrap_or(u32::MAX),
        })))
    }
}

fn complete(path: String) -> RouterOutput {
    RouterOutput::Reply(Message::OperationComplete(OperationComplete { path }))
}
