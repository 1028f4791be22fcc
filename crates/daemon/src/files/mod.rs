//! File browsing and transfer.
//!
//! - [`sanitizer`]: turns untrusted client paths into [`SanitizedPath`]s
//! - [`browser`]: directory listings
//! - [`transfer`]: downloads, uploads and batch copy/cut/delete
//! - [`handler`]: the `/file/` HTTP endpoints
//!
//! # Security
//!
//! Nothing in this module touches the filesystem with a client path that
//! has not been through [`PathSanitizer::sanitize`].

pub mod browser;
pub mod handler;
pub mod sanitizer;
pub mod transfer;

pub use browser::{is_media_file, list_directory, BrowserError};
pub use handler::FileHandler;
pub use sanitizer::{PathSanitizer, SanitizeError, SanitizedPath};
pub use transfer::{BatchOp, BatchSummary, TransferError};
