//! # TVRemote Protocol Library
//!
//! Wire types shared by the TVRemote daemon and its companion clients.
//!
//! The daemon speaks plain HTTP on the local network. Most endpoints answer
//! with a small JSON body; this crate defines those bodies so that clients
//! written in Rust can decode them without re-declaring the field names.
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::messages::{from_json, MouseMoved};
//!
//! let moved: MouseMoved = from_json(br#"{"status":"ok","x":1060,"y":540}"#).unwrap();
//! assert_eq!(moved.x, 1060);
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: JSON response bodies
//! - [`error`]: Error types

pub mod error;
pub mod messages;

pub use error::{ProtocolError, Result};
pub use messages::{
    DirectoryListing, FileEntry, LegacyReply, MouseMoved, MouseStatus, StatusReply, UploadReply,
};
