//! Ranked strategies for performing a gesture.
//!
//! The engine tries each [`InjectionTier`] in order until one accepts the
//! command:
//!
//! 1. [`NativeGestureTier`]: the platform's accessibility gesture API, when
//!    the bridge reports support for it. Acceptance is immediate; the real
//!    outcome arrives later on a oneshot channel.
//! 2. [`ShellChannelTier`]: an `input ...` command line over a connected
//!    [`ShellChannel`].
//! 3. [`ProcessSpawnTier`]: the same command run as a local process.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use super::gesture::{GestureCommand, GestureOutcome, Stroke};
use super::shell::ShellChannel;

/// Android key code for the back key.
pub const KEYCODE_BACK: u32 = 4;

/// Result of offering a command to one tier.
#[derive(Debug)]
pub enum TierAttempt {
    /// Handed off; nothing further to wait for.
    Delivered,
    /// Accepted; the outcome arrives on the receiver.
    Awaiting(oneshot::Receiver<GestureOutcome>),
    /// The tier is not usable right now.
    Unavailable,
    /// The tier was usable but rejected the command.
    Failed,
}

/// One way of injecting a gesture.
pub trait InjectionTier: Send + Sync {
    fn name(&self) -> &'static str;

    fn try_execute(&self, command: &GestureCommand) -> TierAttempt;
}

/// The platform accessibility service.
pub trait AccessibilityBridge: Send + Sync {
    /// Whether path-based gesture dispatch exists on this platform.
    fn supports_gestures(&self) -> bool;

    /// Dispatch a stroke. `None` means the platform refused it outright.
    fn dispatch_gesture(&self, stroke: &Stroke) -> Option<oneshot::Receiver<GestureOutcome>>;

    /// Perform the global "navigate back" action.
    fn navigate_back(&self) -> bool;

    /// Platform API level reported by `/mouse/status`.
    fn api_level(&self) -> u32;
}

/// Resolve the `input` tool on `PATH`, or take an explicit path as is.
pub fn resolve_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.is_absolute() {
        return candidate.exists().then(|| candidate.to_path_buf());
    }
    match which::which(program) {
        Ok(path) => Some(path),
        Err(e) => {
            debug!(program = %program, error = %e, "Input tool not found on PATH");
            None
        }
    }
}

/// Spawn `program args...` without waiting for it.
///
/// The exit status is logged by a background task.
pub fn spawn_detached(program: &Path, args: &[String]) -> std::io::Result<()> {
    let mut child = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(false)
        .spawn()?;

    let program = program.display().to_string();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) if status.success() => trace!(program = %program, "Input process finished"),
            Ok(status) => warn!(program = %program, %status, "Input process failed"),
            Err(e) => warn!(program = %program, error = %e, "Failed to reap input process"),
        }
    });
    Ok(())
}

// ============================================================================
// Tier 1
// ============================================================================

/// Gesture dispatch through the accessibility bridge.
pub struct NativeGestureTier {
    bridge: Arc<dyn AccessibilityBridge>,
    capable: bool,
}

impl NativeGestureTier {
    /// The capability flag is read once, here.
    pub fn new(bridge: Arc<dyn AccessibilityBridge>) -> Self {
        let capable = bridge.supports_gestures();
        debug!(capable, "Native gesture dispatch probed");
        Self { bridge, capable }
    }

    pub fn is_capable(&self) -> bool {
        self.capable
    }
}

impl InjectionTier for NativeGestureTier {
    fn name(&self) -> &'static str {
        "native"
    }

    fn try_execute(&self, command: &GestureCommand) -> TierAttempt {
        if !self.capable {
            return TierAttempt::Unavailable;
        }
        match self.bridge.dispatch_gesture(&command.stroke) {
            Some(outcome) => TierAttempt::Awaiting(outcome),
            None => TierAttempt::Failed,
        }
    }
}

// ============================================================================
// Tier 2
// ============================================================================

/// `input ...` command lines sent over a [`ShellChannel`].
pub struct ShellChannelTier {
    channel: Arc<dyn ShellChannel>,
    program: String,
}

impl ShellChannelTier {
    pub fn new(channel: Arc<dyn ShellChannel>, program: impl Into<String>) -> Self {
        Self {
            channel,
            program: program.into(),
        }
    }
}

impl InjectionTier for ShellChannelTier {
    fn name(&self) -> &'static str {
        "shell-channel"
    }

    fn try_execute(&self, command: &GestureCommand) -> TierAttempt {
        if !self.channel.is_connected() {
            return TierAttempt::Unavailable;
        }
        if self.channel.send(&command.shell_command(&self.program)) {
            TierAttempt::Delivered
        } else {
            TierAttempt::Failed
        }
    }
}

// ============================================================================
// Tier 3
// ============================================================================

/// The `input` tool spawned as a local process.
pub struct ProcessSpawnTier {
    program: Option<PathBuf>,
}

impl ProcessSpawnTier {
    pub fn new(program: Option<PathBuf>) -> Self {
        Self { program }
    }

    /// Resolve `program` through [`resolve_program`].
    pub fn resolve(program: &str) -> Self {
        Self::new(resolve_program(program))
    }
}

impl InjectionTier for ProcessSpawnTier {
    fn name(&self) -> &'static str {
        "process"
    }

    fn try_execute(&self, command: &GestureCommand) -> TierAttempt {
        let Some(program) = &self.program else {
            return TierAttempt::Unavailable;
        };
        match spawn_detached(program, &command.shell_args()) {
            Ok(()) => TierAttempt::Delivered,
            Err(e) => {
                warn!(program = %program.display(), error = %e, "Failed to spawn input process");
                TierAttempt::Failed
            }
        }
    }
}

// ============================================================================
// Headless bridge
// ============================================================================

/// Bridge for hosts without an accessibility service.
///
/// Gesture dispatch is reported as unsupported so the engine goes straight
/// to the shell tiers. "Back" is sent as a key event through the `input`
/// tool.
pub struct HeadlessBridge {
    program: Option<PathBuf>,
    api_level: u32,
}

impl HeadlessBridge {
    pub fn new(program: Option<PathBuf>, api_level: u32) -> Self {
        Self { program, api_level }
    }
}

impl AccessibilityBridge for HeadlessBridge {
    fn supports_gestures(&self) -> bool {
        false
    }

    fn dispatch_gesture(&self, _stroke: &Stroke) -> Option<oneshot::Receiver<GestureOutcome>> {
        None
    }

    fn navigate_back(&self) -> bool {
        let Some(program) = &self.program else {
            debug!("No input tool available for the back action");
            return false;
        };
        let args = vec!["keyevent".to_string(), KEYCODE_BACK.to_string()];
        match spawn_detached(program, &args) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to send back key event");
                false
            }
        }
    }

    fn api_level(&self) -> u32 {
        self.api_level
    }
}
