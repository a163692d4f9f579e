//! # CraftPanel File Core
//!
//! Per-server file management for the CraftPanel Minecraft control panel.
//!
//! ## Overview
//!
//! Each managed server keeps its game data under
//! `<servers_dir>/<server_id>/mc-data`. This crate lets the panel browse and
//! edit that tree without ever touching anything outside it:
//!
//! - **Confinement**: every client path is normalized and checked against the
//!   server root before use
//! - **Browsing**: directory listings and entry metadata
//! - **Editing**: bounded text reads and atomic writes
//! - **Transfers**: resumable downloads, streamed zip archives, batch uploads
//! - **Mutations**: mkdir, rename and delete
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                Message Router                │
//! ├──────────────────────────────────────────────┤
//! │                 FileManager                  │
//! │  ┌────────┐ ┌─────────┐ ┌────────┐ ┌──────┐  │
//! │  │browser │ │ content │ │ export │ │ ops  │  │
//! │  └────────┘ └─────────┘ └────────┘ └──────┘  │
//! │  ┌───────────────────────────────────────┐   │
//! │  │        guard (path confinement)       │   │
//! │  └───────────────────────────────────────┘   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use panel::{Config, FileManager, MessageRouter, Principal};
//! use protocol::messages::FileListRequest;
//! use protocol::Message;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let router = MessageRouter::new(FileManager::from_config(&config.files)?);
//!
//!     let request = Message::FileListRequest(FileListRequest {
//!         server_id: "survival".to_string(),
//!         path: "plugins".to_string(),
//!     });
//!     let output = router.handle(request, &Principal::new("admin")).await;
//!     println!("{:?}", output);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`files`]: Confined file operations
//! - [`router`]: Message routing to file operations

pub mod config;
pub mod files;
pub mod router;

// Re-export protocol for convenience
pub use protocol;

// Re-export config types for convenience
pub use config::Config;

// Re-export files types for convenience
pub use files::{FileError, FileItem, FileManager, ServerRoots};

// Re-export router types for convenience
pub use router::{MessageRouter, Principal, RouterError, RouterOutput, RouterResult};
