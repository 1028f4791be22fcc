//! Pointer input injection.
//!
//! This module provides:
//! - A clamped virtual pointer ([`pointer`])
//! - Gesture commands and their shell forms ([`gesture`])
//! - Three ranked injection tiers ([`tiers`], [`shell`])
//! - The tier-walking engine with stale-fallback protection ([`engine`])
//! - The cursor auto-hide state machine ([`cursor`])
//! - A single task owning all of the above ([`context`])
//! - The `/mouse/` HTTP endpoints ([`handler`])

pub mod context;
pub mod cursor;
pub mod engine;
pub mod gesture;
pub mod handler;
pub mod pointer;
pub mod shell;
pub mod tiers;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::InputConfig;

pub use context::{InputError, InputHandle, InputRegistry};
pub use cursor::{CursorController, CursorOverlay, LogOverlay};
pub use engine::{GestureTimings, InjectionEngine};
pub use gesture::{GestureCommand, GestureOutcome, MouseButton, SwipeDirection};
pub use handler::MouseHandler;
pub use pointer::ScreenSize;
pub use shell::{ShellChannel, TcpShellChannel};
pub use tiers::{AccessibilityBridge, HeadlessBridge, InjectionTier};

/// A running input context and its helper tasks.
pub struct InputService {
    pub handle: InputHandle,
    pub tasks: Vec<JoinHandle<()>>,
}

impl InputConfig {
    pub fn screen(&self) -> ScreenSize {
        ScreenSize::new(self.screen_width, self.screen_height)
    }

    pub fn timings(&self) -> GestureTimings {
        GestureTimings {
            tap: Duration::from_millis(self.tap_duration_ms),
            long_press: Duration::from_millis(self.long_press_ms),
            scroll: Duration::from_millis(self.scroll_duration_ms),
            swipe: Duration::from_millis(self.swipe_duration_ms),
            scroll_gain: self.scroll_gain,
            swipe_distance: self.swipe_distance,
        }
    }

    pub fn cursor_hide_delay(&self) -> Duration {
        Duration::from_millis(self.cursor_hide_delay_ms)
    }
}

/// Build the tier list and spawn the input context.
///
/// Without an explicit `bridge`, a [`HeadlessBridge`] is used. The shell
/// channel tier is only present when `config.shell_channel` is set.
pub fn start_input(
    config: &InputConfig,
    bridge: Option<Arc<dyn AccessibilityBridge>>,
    overlay: Arc<dyn CursorOverlay>,
    shutdown: CancellationToken,
) -> InputService {
    let program = tiers::resolve_program(&config.input_program);
    let bridge = bridge.unwrap_or_else(|| {
        Arc::new(HeadlessBridge::new(program.clone(), config.api_level))
    });

    let mut tasks = Vec::new();
    let mut tier_list: Vec<Box<dyn InjectionTier>> =
        vec![Box::new(tiers::NativeGestureTier::new(Arc::clone(&bridge)))];

    if let Some(address) = &config.shell_channel {
        let (channel, task) = TcpShellChannel::spawn(address.clone(), shutdown.clone());
        tasks.push(task);
        tier_list.push(Box::new(tiers::ShellChannelTier::new(
            Arc::new(channel),
            config.input_program.clone(),
        )));
    }

    tier_list.push(Box::new(tiers::ProcessSpawnTier::new(program)));

    let engine = InjectionEngine::new(config.screen(), config.timings(), tier_list, bridge);
    let cursor = CursorController::new(overlay, config.cursor_hide_delay());
    let (handle, task) = context::InputContext::spawn(engine, cursor, shutdown);
    tasks.push(task);

    info!(
        shell_channel = config.shell_channel.as_deref().unwrap_or("none"),
        "Input service started"
    );
    InputService { handle, tasks }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes for the platform collaborators.

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;
    use tokio_util::sync::CancellationToken;

    use super::context::{InputContext, InputHandle};
    use super::cursor::{CursorController, CursorOverlay};
    use super::engine::{GestureTimings, InjectionEngine};
    use super::gesture::{GestureOutcome, Stroke};
    use super::pointer::ScreenSize;
    use super::shell::ShellChannel;
    use super::tiers::{
        AccessibilityBridge, InjectionTier, NativeGestureTier, ProcessSpawnTier, ShellChannelTier,
    };

    pub struct FakeBridge {
        capable: bool,
        reject: AtomicBool,
        dispatched: AtomicUsize,
        back_presses: AtomicUsize,
        outcomes: Mutex<Vec<oneshot::Sender<GestureOutcome>>>,
    }

    impl FakeBridge {
        pub fn new(capable: bool) -> Self {
            Self {
                capable,
                reject: AtomicBool::new(false),
                dispatched: AtomicUsize::new(0),
                back_presses: AtomicUsize::new(0),
                outcomes: Mutex::new(Vec::new()),
            }
        }

        pub fn reject_dispatch(&self, reject: bool) {
            self.reject.store(reject, Ordering::SeqCst);
        }

        pub fn dispatched(&self) -> usize {
            self.dispatched.load(Ordering::SeqCst)
        }

        pub fn back_presses(&self) -> usize {
            self.back_presses.load(Ordering::SeqCst)
        }

        /// Report `outcome` for every gesture still waiting.
        pub fn resolve_all(&self, outcome: GestureOutcome) {
            for sender in self.outcomes.lock().unwrap().drain(..) {
                let _ = sender.send(outcome);
            }
        }

        /// Drop every waiting sender without an answer.
        pub fn drop_all(&self) {
            self.outcomes.lock().unwrap().clear();
        }
    }

    impl AccessibilityBridge for FakeBridge {
        fn supports_gestures(&self) -> bool {
            self.capable
        }

        fn dispatch_gesture(&self, _stroke: &Stroke) -> Option<oneshot::Receiver<GestureOutcome>> {
            if self.reject.load(Ordering::SeqCst) {
                return None;
            }
            self.dispatched.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = oneshot::channel();
            self.outcomes.lock().unwrap().push(tx);
            Some(rx)
        }

        fn navigate_back(&self) -> bool {
            self.back_presses.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn api_level(&self) -> u32 {
            30
        }
    }

    pub struct FakeShell {
        connected: AtomicBool,
        sent: Mutex<Vec<String>>,
    }

    impl FakeShell {
        pub fn new(connected: bool) -> Self {
            Self {
                connected: AtomicBool::new(connected),
                sent: Mutex::new(Vec::new()),
            }
        }

        pub fn set_connected(&self, connected: bool) {
            self.connected.store(connected, Ordering::SeqCst);
        }

        pub fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl ShellChannel for FakeShell {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn send(&self, command: &str) -> bool {
            self.sent.lock().unwrap().push(command.to_string());
            true
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum OverlayEvent {
        Show,
        Hide,
        Move(i32, i32),
    }

    #[derive(Default)]
    pub struct RecordingOverlay {
        events: Mutex<Vec<OverlayEvent>>,
    }

    impl RecordingOverlay {
        pub fn events(&self) -> Vec<OverlayEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl CursorOverlay for RecordingOverlay {
        fn show(&self) {
            self.events.lock().unwrap().push(OverlayEvent::Show);
        }

        fn hide(&self) {
            self.events.lock().unwrap().push(OverlayEvent::Hide);
        }

        fn move_to(&self, x: i32, y: i32) {
            self.events.lock().unwrap().push(OverlayEvent::Move(x, y));
        }
    }

    /// A running context on a 1920x1080 screen wired to fakes.
    pub struct FakeContext {
        pub handle: InputHandle,
        pub task: JoinHandle<()>,
        pub shutdown: CancellationToken,
        pub bridge: Arc<FakeBridge>,
        pub shell: Arc<FakeShell>,
        pub overlay: Arc<RecordingOverlay>,
    }

    impl FakeContext {
        pub async fn stop(self) {
            self.shutdown.cancel();
            self.task.await.unwrap();
        }
    }

    pub fn start_fake_context(capable: bool, shell_connected: bool) -> FakeContext {
        let bridge = Arc::new(FakeBridge::new(capable));
        let shell = Arc::new(FakeShell::new(shell_connected));
        let overlay = Arc::new(RecordingOverlay::default());
        let tiers: Vec<Box<dyn InjectionTier>> = vec![
            Box::new(NativeGestureTier::new(bridge.clone())),
            Box::new(ShellChannelTier::new(shell.clone(), "input")),
            Box::new(ProcessSpawnTier::new(None)),
        ];
        let engine = InjectionEngine::new(
            ScreenSize::new(1920, 1080),
            GestureTimings::default(),
            tiers,
            bridge.clone(),
        );
        let cursor = CursorController::new(overlay.clone(), std::time::Duration::from_secs(5));
        let shutdown = CancellationToken::new();
        let (handle, task) = InputContext::spawn(engine, cursor, shutdown.clone());
        FakeContext {
            handle,
            task,
            shutdown,
            bridge,
            shell,
            overlay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_start_input_without_shell_channel() {
        let mut config = Config::default().input;
        config.input_program = "definitely-not-an-input-tool-xyz".to_string();
        let shutdown = CancellationToken::new();

        let service = start_input(&config, None, Arc::new(LogOverlay), shutdown.clone());
        assert_eq!(service.tasks.len(), 1);
        assert_eq!(service.handle.screen(), config.screen());

        // Headless bridge, no shell channel, no input tool: every gesture fails.
        assert!(!service.handle.click(MouseButton::Left).await.unwrap());
        assert_eq!(service.handle.move_by(10, 0).await.unwrap(), (970, 540));

        shutdown.cancel();
        for task in service.tasks {
            task.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_start_input_with_shell_channel() {
        let mut config = Config::default().input;
        config.shell_channel = Some("127.0.0.1:9".to_string());
        let shutdown = CancellationToken::new();

        let service = start_input(&config, None, Arc::new(LogOverlay), shutdown.clone());
        assert_eq!(service.tasks.len(), 2);

        shutdown.cancel();
        for task in service.tasks {
            task.await.unwrap();
        }
    }

    #[test]
    fn test_config_conversions() {
        let config = Config::default().input;
        assert_eq!(config.screen(), ScreenSize::new(1920, 1080));
        assert_eq!(config.timings(), GestureTimings::default());
        assert_eq!(config.cursor_hide_delay(), Duration::from_secs(5));
    }
}
