//! # TVRemote Daemon Library
//!
//! This crate provides a LAN remote-control endpoint: an HTTP API that lets
//! a companion client drive a virtual pointer, browse and transfer files,
//! and start playback on a device without a native input channel.
//!
//! ## Overview
//!
//! - **Request Routing**: ordered handlers, first match wins
//! - **Path Sanitization**: client paths confined to one base directory
//! - **File Operations**: listing, download, upload and batch copy/cut/delete
//! - **Input Injection**: gestures through three ranked fallback tiers
//! - **Cursor Overlay**: visibility driven by an inactivity timer
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Daemon Orchestrator                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  axum bridge ──► RequestRouter                                  │
//! │                    ├─ FileHandler ──► PathSanitizer ──► fs       │
//! │                    ├─ MouseHandler ──► InputRegistry             │
//! │                    │                     └─ InputContext task    │
//! │                    │                          ├─ InjectionEngine │
//! │                    │                          └─ CursorController│
//! │                    ├─ PlayHandler ──► VideoLauncher              │
//! │                    └─ TorrentHandler                             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use daemon::{Config, DaemonOrchestrator, PlatformHooks};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!
//!     let orchestrator = DaemonOrchestrator::new(config, PlatformHooks::default())?;
//!     orchestrator.start().await?;
//!
//!     // Serving until stopped...
//!
//!     orchestrator.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`router`]: Request/response types and the handler registry
//! - [`files`]: Path sanitizer and file endpoints
//! - [`input`]: Pointer, gesture tiers, cursor and mouse endpoints
//! - [`play`]: Playback hand-off
//! - [`legacy`]: Removed torrent endpoints
//! - [`server`]: axum bridge
//! - [`orchestrator`]: Main daemon coordinator

pub mod config;
pub mod files;
pub mod input;
pub mod legacy;
pub mod orchestrator;
pub mod play;
pub mod router;
pub mod server;

// Re-export protocol for convenience
pub use protocol;

// Re-export config types for convenience
pub use config::{Config, ConfigError};

// Re-export files types for convenience
pub use files::{FileHandler, PathSanitizer, SanitizeError, SanitizedPath};

// Re-export input types for convenience
pub use input::{
    AccessibilityBridge, CursorOverlay, InputHandle, InputRegistry, MouseHandler, ShellChannel,
};

// Re-export router types for convenience
pub use router::{HandlerError, Request, RequestHandler, RequestRouter, Response};

// Re-export playback types for convenience
pub use play::{PlayHandler, SystemVideoLauncher, VideoLauncher};

// Re-export server types for convenience
pub use server::{build_app, start_server, ServerError};

// Re-export orchestrator types for convenience
pub use orchestrator::{DaemonOrchestrator, OrchestratorEvent, OrchestratorState, PlatformHooks};
