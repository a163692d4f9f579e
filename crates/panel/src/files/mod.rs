//! Per-server file management.
//!
//! Everything the panel's file browser can do to a server's data directory:
//! listing, metadata, text editing, uploads, downloads, zip archives and
//! rename/delete/mkdir.
//!
//! # Security
//!
//! All paths come from the client and are untrusted. Each operation confines
//! its path to the server root through [`guard::ServerRoots::confine`] before
//! touching the filesystem. Confinement is lexical; paths that normalize to a
//! location outside the root are rejected with [`FileError::InvalidPath`].

pub mod browser;
pub mod content;
pub mod error;
pub mod export;
pub mod guard;
pub mod ingest;
pub mod manager;
pub mod metadata;
pub mod ops;

pub use browser::Listing;
pub use content::{TextContent, MAX_TEXT_SIZE};
pub use error::FileError;
pub use export::{ArchiveDownload, ByteStream, FileDownload};
pub use guard::{ConfinedPath, ServerRoots, DEFAULT_GLOBAL_SERVER_ID};
pub use ingest::{IngestReport, UploadItem};
pub use manager::{FileManager, FileSettings};
pub use metadata::FileItem;
