//! # CraftPanel Protocol Library
//!
//! Message definitions shared by the CraftPanel request layer and the file
//! core.
//!
//! ## Overview
//!
//! - **Message Definitions**: request and response types for listing, reading,
//!   writing, renaming, deleting, downloading and uploading server files
//! - **Validation**: shape checks applied before a request reaches the core
//! - **Encodings**: MessagePack for internal hops, JSON for the browser UI
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{Envelope, Message};
//! use protocol::messages::FileListRequest;
//!
//! let message = Message::FileListRequest(FileListRequest {
//!     server_id: "survival".to_string(),
//!     path: "world/datapacks".to_string(),
//! });
//! message.validate().unwrap();
//!
//! let envelope = Envelope::new(1, message);
//! let bytes = envelope.to_msgpack().unwrap();
//! assert_eq!(Envelope::from_msgpack(&bytes).unwrap(), envelope);
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: Protocol message definitions
//! - [`error`]: Error types

pub mod error;
pub mod messages;

pub use error::{ProtocolError, Result};
pub use messages::{Envelope, ErrorCode, Message, PROTOCOL_VERSION, TEXT_ENCODING};
