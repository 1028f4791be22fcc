//! The input context: a single task that owns the engine and the cursor.
//!
//! Request handlers never touch pointer or cursor state directly. They hold
//! an [`InputHandle`] and send [`UiCommand`]s to the context task, which
//! applies them one at a time, sleeps until the cursor's auto-hide deadline,
//! and feeds asynchronous gesture outcomes back into the engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cursor::CursorController;
use super::engine::{Dispatch, InjectionEngine, Ticket};
use super::gesture::{GestureOutcome, MouseButton, SwipeDirection};
use super::pointer::ScreenSize;

const COMMAND_QUEUE_DEPTH: usize = 256;

/// How long a dispatched gesture may stay unanswered before it is assumed
/// to have completed.
pub const OUTCOME_TIMEOUT: Duration = Duration::from_secs(3);

/// Errors returned by [`InputHandle`].
#[derive(Debug, Error)]
pub enum InputError {
    /// The context task has stopped.
    #[error("input context is not running")]
    ContextStopped,
}

/// A gesture request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureAction {
    Click(MouseButton),
    LongClick,
    Scroll(i32),
    Swipe(SwipeDirection, Option<i32>),
}

/// Pointer and cursor state as seen by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerSnapshot {
    pub x: i32,
    pub y: i32,
    pub cursor_visible: bool,
}

/// Messages processed by the context task.
#[derive(Debug)]
pub enum UiCommand {
    Move {
        dx: i32,
        dy: i32,
        reply: oneshot::Sender<(i32, i32)>,
    },
    Reset {
        reply: oneshot::Sender<(i32, i32)>,
    },
    Gesture {
        action: GestureAction,
        reply: oneshot::Sender<bool>,
    },
    Show {
        reply: oneshot::Sender<()>,
    },
    Hide {
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<PointerSnapshot>,
    },
    Settled {
        ticket: Ticket,
        outcome: GestureOutcome,
    },
}

/// Cloneable handle to a running input context.
#[derive(Debug, Clone)]
pub struct InputHandle {
    commands: mpsc::Sender<UiCommand>,
    showing: Arc<AtomicBool>,
    screen: ScreenSize,
    api_level: u32,
}

impl InputHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> UiCommand,
    ) -> Result<T, InputError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| InputError::ContextStopped)?;
        rx.await.map_err(|_| InputError::ContextStopped)
    }

    /// Move the pointer and return the clamped position.
    pub async fn move_by(&self, dx: i32, dy: i32) -> Result<(i32, i32), InputError> {
        self.request(|reply| UiCommand::Move { dx, dy, reply }).await
    }

    /// Move the pointer back to the centre of the screen.
    pub async fn reset(&self) -> Result<(i32, i32), InputError> {
        self.request(|reply| UiCommand::Reset { reply }).await
    }

    /// Perform a gesture. `Ok(false)` means every tier failed.
    pub async fn gesture(&self, action: GestureAction) -> Result<bool, InputError> {
        self.request(|reply| UiCommand::Gesture { action, reply }).await
    }

    pub async fn click(&self, button: MouseButton) -> Result<bool, InputError> {
        self.gesture(GestureAction::Click(button)).await
    }

    pub async fn long_click(&self) -> Result<bool, InputError> {
        self.gesture(GestureAction::LongClick).await
    }

    pub async fn scroll(&self, dy: i32) -> Result<bool, InputError> {
        self.gesture(GestureAction::Scroll(dy)).await
    }

    pub async fn swipe(
        &self,
        direction: SwipeDirection,
        distance: Option<i32>,
    ) -> Result<bool, InputError> {
        self.gesture(GestureAction::Swipe(direction, distance)).await
    }

    pub async fn show_cursor(&self) -> Result<(), InputError> {
        self.request(|reply| UiCommand::Show { reply }).await
    }

    pub async fn hide_cursor(&self) -> Result<(), InputError> {
        self.request(|reply| UiCommand::Hide { reply }).await
    }

    pub async fn snapshot(&self) -> Result<PointerSnapshot, InputError> {
        self.request(|reply| UiCommand::Snapshot { reply }).await
    }

    /// Cursor visibility, readable without a round trip.
    pub fn is_showing(&self) -> bool {
        self.showing.load(Ordering::Acquire)
    }

    pub fn screen(&self) -> ScreenSize {
        self.screen
    }

    pub fn api_level(&self) -> u32 {
        self.api_level
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}

/// State owned by the context task.
pub struct InputContext {
    engine: InjectionEngine,
    cursor: CursorController,
    commands: mpsc::Receiver<UiCommand>,
    loopback: mpsc::WeakSender<UiCommand>,
}

impl InputContext {
    /// Spawn the context task. It runs until `shutdown` is cancelled or every
    /// handle is dropped.
    ///
    /// The cursor is shown once at startup.
    pub fn spawn(
        engine: InjectionEngine,
        cursor: CursorController,
        shutdown: CancellationToken,
    ) -> (InputHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        let handle = InputHandle {
            commands: tx.clone(),
            showing: cursor.showing_flag(),
            screen: engine.screen(),
            api_level: engine.api_level(),
        };

        let context = Self {
            engine,
            cursor,
            commands: rx,
            loopback: tx.downgrade(),
        };
        drop(tx);

        let task = tokio::spawn(context.run(shutdown));
        (handle, task)
    }

    async fn run(mut self, shutdown: CancellationToken) {
        let (x, y) = self.engine.position();
        self.cursor.move_to(x, y);
        self.cursor.show(Instant::now());
        info!(x, y, "Input context started");

        loop {
            let deadline = self.cursor.deadline();
            let wake_at = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Input context shutting down");
                    break;
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => break,
                },
                _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => {
                    if self.cursor.expire(Instant::now()) {
                        debug!("Cursor hidden after inactivity");
                    }
                }
            }
        }

        self.cursor.hide();
        info!("Input context stopped");
    }

    fn apply(&mut self, command: UiCommand) {
        match command {
            UiCommand::Move { dx, dy, reply } => {
                let (x, y) = self.engine.move_by(dx, dy);
                self.cursor.move_to(x, y);
                self.cursor.activity(Instant::now());
                let _ = reply.send((x, y));
            }
            UiCommand::Reset { reply } => {
                let (x, y) = self.engine.reset();
                self.cursor.move_to(x, y);
                self.cursor.activity(Instant::now());
                let _ = reply.send((x, y));
            }
            UiCommand::Gesture { action, reply } => {
                self.cursor.activity(Instant::now());
                let dispatch = match action {
                    GestureAction::Click(button) => self.engine.click(button),
                    GestureAction::LongClick => self.engine.long_click(),
                    GestureAction::Scroll(dy) => self.engine.scroll(dy),
                    GestureAction::Swipe(direction, distance) => {
                        self.engine.swipe(direction, distance)
                    }
                };
                let accepted = dispatch.accepted;
                self.watch(dispatch);
                let _ = reply.send(accepted);
            }
            UiCommand::Show { reply } => {
                self.cursor.show(Instant::now());
                let _ = reply.send(());
            }
            UiCommand::Hide { reply } => {
                self.cursor.hide();
                let _ = reply.send(());
            }
            UiCommand::Snapshot { reply } => {
                let (x, y) = self.engine.position();
                let _ = reply.send(PointerSnapshot {
                    x,
                    y,
                    cursor_visible: self.cursor.is_showing(),
                });
            }
            UiCommand::Settled { ticket, outcome } => {
                if let Some(retry) = self.engine.settle(ticket, outcome) {
                    if !retry.accepted {
                        warn!(ticket, "Fallback after cancellation failed");
                    }
                    self.watch(retry);
                }
            }
        }
    }

    /// Wait for a parked gesture's outcome off the context task.
    ///
    /// No answer within [`OUTCOME_TIMEOUT`] counts as completion; a dropped
    /// sender counts as cancellation.
    fn watch(&self, dispatch: Dispatch) {
        let Some((ticket, outcome)) = dispatch.pending else {
            return;
        };
        let Some(loopback) = self.loopback.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(OUTCOME_TIMEOUT, outcome).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(_)) => GestureOutcome::Cancelled,
                Err(_) => {
                    debug!(ticket, "Gesture outcome timed out, assuming completion");
                    GestureOutcome::Completed
                }
            };
            let _ = loopback.send(UiCommand::Settled { ticket, outcome }).await;
        });
    }
}

/// Where request handlers find the input context.
///
/// Empty until the context is attached; handlers treat an empty registry
/// as "service not enabled".
#[derive(Debug, Clone, Default)]
pub struct InputRegistry {
    slot: Arc<RwLock<Option<InputHandle>>>,
}

impl InputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handle(handle: InputHandle) -> Self {
        let registry = Self::new();
        registry.attach(handle);
        registry
    }

    pub fn attach(&self, handle: InputHandle) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = Some(handle);
        }
    }

    pub fn detach(&self) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = None;
        }
    }

    /// The attached handle, if its context is still running.
    pub fn get(&self) -> Option<InputHandle> {
        let slot = self.slot.read().ok()?;
        slot.as_ref().filter(|h| h.is_running()).cloned()
    }

    pub fn is_enabled(&self) -> bool {
        self.get().is_some()
    }
}
