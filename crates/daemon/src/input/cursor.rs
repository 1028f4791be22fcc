//! Cursor overlay visibility.
//!
//! [`CursorController`] is a small timer state machine. It is owned by the
//! input context task, which sleeps until [`CursorController::deadline`] and
//! then calls [`CursorController::expire`]. Resetting the countdown only
//! moves the deadline, so there is never more than one pending hide.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

/// The on-screen pointer drawing.
pub trait CursorOverlay: Send + Sync {
    fn show(&self);
    fn hide(&self);
    fn move_to(&self, x: i32, y: i32);
}

/// Overlay for hosts without a display surface; it only logs.
#[derive(Debug, Default)]
pub struct LogOverlay;

impl CursorOverlay for LogOverlay {
    fn show(&self) {
        debug!("Cursor shown");
    }

    fn hide(&self) {
        debug!("Cursor hidden");
    }

    fn move_to(&self, x: i32, y: i32) {
        trace!(x, y, "Cursor moved");
    }
}

/// Why the cursor is hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HideReason {
    /// Never shown yet.
    Initial,
    /// A client asked for it.
    Explicit,
    /// The inactivity countdown ran out.
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visibility {
    Hidden(HideReason),
    Visible { hide_at: Instant },
}

pub struct CursorController {
    overlay: Arc<dyn CursorOverlay>,
    hide_delay: Duration,
    visibility: Visibility,
    showing: Arc<AtomicBool>,
}

impl CursorController {
    pub fn new(overlay: Arc<dyn CursorOverlay>, hide_delay: Duration) -> Self {
        Self {
            overlay,
            hide_delay,
            visibility: Visibility::Hidden(HideReason::Initial),
            showing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Show the cursor and (re)start the countdown.
    pub fn show(&mut self, now: Instant) {
        if !self.is_showing() {
            self.overlay.show();
            self.showing.store(true, Ordering::Release);
        }
        self.visibility = Visibility::Visible {
            hide_at: now + self.hide_delay,
        };
    }

    /// Hide the cursor and drop any pending countdown.
    pub fn hide(&mut self) {
        self.set_hidden(HideReason::Explicit);
    }

    /// Record pointer activity.
    ///
    /// Restarts the countdown when visible and re-shows a cursor that was
    /// hidden by the countdown. An explicit hide sticks until the next
    /// [`show`](Self::show).
    pub fn activity(&mut self, now: Instant) {
        match self.visibility {
            Visibility::Visible { .. }
            | Visibility::Hidden(HideReason::Timeout)
            | Visibility::Hidden(HideReason::Initial) => self.show(now),
            Visibility::Hidden(HideReason::Explicit) => {}
        }
    }

    /// Hide the cursor if the countdown has run out. Returns whether it did.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.visibility {
            Visibility::Visible { hide_at } if now >= hide_at => {
                self.set_hidden(HideReason::Timeout);
                true
            }
            _ => false,
        }
    }

    /// When the pending auto-hide fires. `Some` exactly while visible.
    pub fn deadline(&self) -> Option<Instant> {
        match self.visibility {
            Visibility::Visible { hide_at } => Some(hide_at),
            Visibility::Hidden(_) => None,
        }
    }

    pub fn move_to(&self, x: i32, y: i32) {
        self.overlay.move_to(x, y);
    }

    pub fn is_showing(&self) -> bool {
        matches!(self.visibility, Visibility::Visible { .. })
    }

    pub fn hidden_reason(&self) -> Option<HideReason> {
        match self.visibility {
            Visibility::Hidden(reason) => Some(reason),
            Visibility::Visible { .. } => None,
        }
    }

    /// Visibility flag readable from any thread.
    pub fn showing_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.showing)
    }

    fn set_hidden(&mut self, reason: HideReason) {
        if self.is_showing() {
            self.overlay.hide();
            self.showing.store(false, Ordering::Release);
        }
        self.visibility = Visibility::Hidden(reason);
    }
}
