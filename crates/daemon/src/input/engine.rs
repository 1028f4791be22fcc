//! Pointer model and tiered gesture dispatch.
//!
//! [`InjectionEngine`] is synchronous and single-owner: the input context
//! task owns it and feeds it one command at a time. Gestures whose first
//! accepting tier answers asynchronously are parked under a ticket together
//! with the engine epoch at dispatch time. The epoch advances on every
//! pointer mutation and every new gesture, so a late cancellation for a
//! superseded gesture is dropped instead of replayed on a lower tier.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::gesture::{GestureCommand, GestureOutcome, MouseButton, SwipeDirection};
use super::pointer::{PointerState, ScreenSize};
use super::tiers::{AccessibilityBridge, InjectionTier, TierAttempt};

/// Durations and distances used to build gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureTimings {
    pub tap: Duration,
    pub long_press: Duration,
    pub scroll: Duration,
    pub swipe: Duration,
    /// Pixels per unit of scroll delta.
    pub scroll_gain: i32,
    /// Default swipe length in pixels.
    pub swipe_distance: i32,
}

impl Default for GestureTimings {
    fn default() -> Self {
        Self {
            tap: Duration::from_millis(50),
            long_press: Duration::from_millis(600),
            scroll: Duration::from_millis(200),
            swipe: Duration::from_millis(300),
            scroll_gain: 50,
            swipe_distance: 400,
        }
    }
}

/// Identifies a gesture whose outcome is still pending.
pub type Ticket = u64;

/// Result of asking the engine to perform a gesture.
#[derive(Debug)]
pub struct Dispatch {
    /// Whether some tier accepted the command.
    pub accepted: bool,
    /// Present when the accepting tier reports its outcome later.
    pub pending: Option<(Ticket, oneshot::Receiver<GestureOutcome>)>,
}

impl Dispatch {
    fn rejected() -> Self {
        Self {
            accepted: false,
            pending: None,
        }
    }

    fn delivered() -> Self {
        Self {
            accepted: true,
            pending: None,
        }
    }
}

#[derive(Debug)]
struct PendingGesture {
    epoch: u64,
    command: GestureCommand,
    /// Index of the first tier to try if this gesture is cancelled.
    resume_from: usize,
}

pub struct InjectionEngine {
    pointer: PointerState,
    timings: GestureTimings,
    tiers: Vec<Box<dyn InjectionTier>>,
    bridge: Arc<dyn AccessibilityBridge>,
    epoch: u64,
    next_ticket: Ticket,
    pending: HashMap<Ticket, PendingGesture>,
}

impl InjectionEngine {
    pub fn new(
        screen: ScreenSize,
        timings: GestureTimings,
        tiers: Vec<Box<dyn InjectionTier>>,
        bridge: Arc<dyn AccessibilityBridge>,
    ) -> Self {
        info!(
            width = screen.width,
            height = screen.height,
            tiers = ?tiers.iter().map(|t| t.name()).collect::<Vec<_>>(),
            "Input engine ready"
        );
        Self {
            pointer: PointerState::new(screen),
            timings,
            tiers,
            bridge,
            epoch: 0,
            next_ticket: 0,
            pending: HashMap::new(),
        }
    }

    pub fn position(&self) -> (i32, i32) {
        self.pointer.position()
    }

    pub fn screen(&self) -> ScreenSize {
        self.pointer.screen()
    }

    pub fn api_level(&self) -> u32 {
        self.bridge.api_level()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn move_by(&mut self, dx: i32, dy: i32) -> (i32, i32) {
        self.epoch += 1;
        self.pointer.move_by(dx, dy)
    }

    pub fn reset(&mut self) -> (i32, i32) {
        self.epoch += 1;
        self.pointer.reset()
    }

    /// Click at the pointer. The right button navigates back instead.
    pub fn click(&mut self, button: MouseButton) -> Dispatch {
        match button {
            MouseButton::Right => {
                self.epoch += 1;
                debug!("Right click mapped to back navigation");
                if self.bridge.navigate_back() {
                    Dispatch::delivered()
                } else {
                    Dispatch::rejected()
                }
            }
            MouseButton::Left | MouseButton::Middle => {
                let command = GestureCommand::tap(self.pointer.position(), self.timings.tap);
                self.perform(command)
            }
        }
    }

    pub fn long_click(&mut self) -> Dispatch {
        let command = GestureCommand::long_press(self.pointer.position(), self.timings.long_press);
        self.perform(command)
    }

    /// Vertical swipe of `dy * scroll_gain` pixels starting at the pointer.
    pub fn scroll(&mut self, dy: i32) -> Dispatch {
        let from = self.pointer.position();
        let to = self
            .pointer
            .offset_y(i64::from(dy) * i64::from(self.timings.scroll_gain));
        let command = GestureCommand::scroll(from, to, self.timings.scroll);
        self.perform(command)
    }

    /// Swipe from the pointer in `direction`, `distance` pixels or the default.
    pub fn swipe(&mut self, direction: SwipeDirection, distance: Option<i32>) -> Dispatch {
        let distance = i64::from(distance.unwrap_or(self.timings.swipe_distance).max(0));
        let (ux, uy) = direction.unit();
        let from = self.pointer.position();
        let to = self.pointer.offset(ux * distance, uy * distance);
        let command = GestureCommand::swipe(from, to, self.timings.swipe);
        self.perform(command)
    }

    /// Start a new gesture from the top tier.
    pub fn perform(&mut self, command: GestureCommand) -> Dispatch {
        self.epoch += 1;
        self.run_from(command, 0)
    }

    /// Apply the outcome of a parked gesture.
    ///
    /// A cancellation re-runs the remaining tiers, unless the pointer moved
    /// or another gesture started since the original dispatch.
    pub fn settle(&mut self, ticket: Ticket, outcome: GestureOutcome) -> Option<Dispatch> {
        let pending = self.pending.remove(&ticket)?;

        match outcome {
            GestureOutcome::Completed => {
                debug!(ticket, kind = %pending.command.kind, "Gesture completed");
                None
            }
            GestureOutcome::Cancelled if pending.epoch != self.epoch => {
                debug!(
                    ticket,
                    kind = %pending.command.kind,
                    "Dropping stale cancellation"
                );
                None
            }
            GestureOutcome::Cancelled => {
                info!(
                    ticket,
                    kind = %pending.command.kind,
                    "Gesture cancelled, falling back"
                );
                Some(self.run_from(pending.command, pending.resume_from))
            }
        }
    }

    fn run_from(&mut self, command: GestureCommand, start: usize) -> Dispatch {
        for (index, tier) in self.tiers.iter().enumerate().skip(start) {
            match tier.try_execute(&command) {
                TierAttempt::Delivered => {
                    debug!(tier = tier.name(), kind = %command.kind, "Gesture delivered");
                    return Dispatch::delivered();
                }
                TierAttempt::Awaiting(outcome) => {
                    let ticket = self.next_ticket;
                    self.next_ticket += 1;
                    debug!(tier = tier.name(), ticket, kind = %command.kind, "Gesture dispatched");
                    self.pending.insert(
                        ticket,
                        PendingGesture {
                            epoch: self.epoch,
                            command,
                            resume_from: index + 1,
                        },
                    );
                    return Dispatch {
                        accepted: true,
                        pending: Some((ticket, outcome)),
                    };
                }
                TierAttempt::Unavailable => {}
                TierAttempt::Failed => {
                    debug!(tier = tier.name(), kind = %command.kind, "Tier rejected gesture");
                }
            }
        }

        warn!(kind = %command.kind, "No injection tier could perform gesture");
        Dispatch::rejected()
    }
}
