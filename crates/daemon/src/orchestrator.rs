//! Daemon orchestrator for wiring together all components.
//!
//! This module provides the `DaemonOrchestrator` that builds the request
//! router from configuration, owns the input registry, spawns the input
//! context and runs the HTTP bridge.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::files::{FileHandler, PathSanitizer};
use crate::input::{
    self, AccessibilityBridge, CursorOverlay, InputRegistry, LogOverlay, MouseHandler,
};
use crate::legacy::TorrentHandler;
use crate::play::{PlayHandler, SystemVideoLauncher, VideoLauncher};
use crate::router::RequestRouter;
use crate::server;

/// Daemon orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// Initial state, not started.
    Stopped,
    /// Starting up, initializing components.
    Starting,
    /// Running and accepting requests.
    Running,
    /// Shutting down gracefully.
    ShuttingDown,
}

/// Events emitted by the orchestrator.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    /// Orchestrator state changed.
    StateChanged(OrchestratorState),
    /// The HTTP server is accepting connections.
    Listening { address: SocketAddr },
    /// The input context is running and reachable by the mouse endpoints.
    InputAttached,
    /// The input context was stopped.
    InputDetached,
    /// Error occurred.
    Error { message: String },
}

/// Platform collaborators the daemon cannot provide by itself.
pub struct PlatformHooks {
    /// Native gesture dispatch. `None` uses the headless bridge.
    pub bridge: Option<Arc<dyn AccessibilityBridge>>,
    pub overlay: Arc<dyn CursorOverlay>,
    pub launcher: Arc<dyn VideoLauncher>,
}

impl Default for PlatformHooks {
    fn default() -> Self {
        Self {
            bridge: None,
            overlay: Arc::new(LogOverlay),
            launcher: Arc::new(SystemVideoLauncher),
        }
    }
}

/// Tasks and token for one start/stop cycle.
struct RunningServices {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Daemon orchestrator that manages all subsystems.
pub struct DaemonOrchestrator {
    /// Configuration.
    config: Config,
    /// Platform collaborators.
    hooks: PlatformHooks,
    /// Current state.
    state: Arc<RwLock<OrchestratorState>>,
    /// Slot the mouse handler reads the input context from.
    registry: InputRegistry,
    /// Request router shared with the HTTP bridge.
    router: Arc<RequestRouter>,
    /// Bound HTTP address while running.
    local_addr: RwLock<Option<SocketAddr>>,
    /// Services of the current run.
    running: Mutex<Option<RunningServices>>,
    /// Parent of each run's token.
    shutdown_token: CancellationToken,
    /// Event sender.
    event_tx: broadcast::Sender<OrchestratorEvent>,
}

impl DaemonOrchestrator {
    /// Creates a new daemon orchestrator.
    pub fn new(config: Config, hooks: PlatformHooks) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let registry = InputRegistry::new();
        let router = Arc::new(Self::build_router(&config, &hooks, &registry));
        info!(
            base_dir = %config.files.base_dir.display(),
            handlers = ?router.handler_names(),
            "Request router ready"
        );

        let (event_tx, _) = broadcast::channel(64);

        Ok(Self {
            config,
            hooks,
            state: Arc::new(RwLock::new(OrchestratorState::Stopped)),
            registry,
            router,
            local_addr: RwLock::new(None),
            running: Mutex::new(None),
            shutdown_token: CancellationToken::new(),
            event_tx,
        })
    }

    fn build_router(
        config: &Config,
        hooks: &PlatformHooks,
        registry: &InputRegistry,
    ) -> RequestRouter {
        let sanitizer = PathSanitizer::new(config.files.base_dir.clone());

        RequestRouter::new()
            .with_handler(Arc::new(FileHandler::new(sanitizer)))
            .with_handler(Arc::new(MouseHandler::new(
                registry.clone(),
                config.input.screen(),
                config.input.api_level,
            )))
            .with_handler(Arc::new(PlayHandler::new(
                Arc::clone(&hooks.launcher),
                config.play.fast_forward_interval_ms,
            )))
            .with_handler(Arc::new(TorrentHandler))
    }

    /// Returns the current state.
    pub async fn state(&self) -> OrchestratorState {
        *self.state.read().await
    }

    /// Returns a receiver for orchestrator events.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.event_tx.subscribe()
    }

    /// The axum application serving this orchestrator's router.
    pub fn app(&self) -> axum::Router {
        server::build_app(
            Arc::clone(&self.router),
            self.config.upload_dir(),
            self.config.server.max_body_size,
        )
    }

    /// Starts the daemon orchestrator.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state != OrchestratorState::Stopped {
                anyhow::bail!("Orchestrator is already running");
            }
            *state = OrchestratorState::Starting;
        }
        self.emit_event(OrchestratorEvent::StateChanged(OrchestratorState::Starting));

        info!("Starting daemon orchestrator...");

        match self.start_services().await {
            Ok(services) => {
                *self.running.lock().await = Some(services);
                self.set_state(OrchestratorState::Running).await;
                info!("Daemon orchestrator started successfully");
                Ok(())
            }
            Err(e) => {
                self.emit_event(OrchestratorEvent::Error {
                    message: format!("{e:#}"),
                });
                self.registry.detach();
                self.set_state(OrchestratorState::Stopped).await;
                Err(e)
            }
        }
    }

    async fn start_services(&self) -> Result<RunningServices> {
        let token = self.shutdown_token.child_token();
        let mut tasks = Vec::new();

        let upload_dir = self.config.upload_dir();
        tokio::fs::create_dir_all(&upload_dir).await.with_context(|| {
            format!("Failed to create upload directory: {}", upload_dir.display())
        })?;

        if self.config.input.enabled {
            let service = input::start_input(
                &self.config.input,
                self.hooks.bridge.clone(),
                Arc::clone(&self.hooks.overlay),
                token.child_token(),
            );
            self.registry.attach(service.handle);
            tasks.extend(service.tasks);
            self.emit_event(OrchestratorEvent::InputAttached);
        } else {
            info!("Input injection disabled by configuration");
        }

        let address = self.config.server.listen_address();
        let started = server::start_server(&address, self.app(), token.clone()).await;
        let (bound, server_task) = match started {
            Ok(started) => started,
            Err(e) => {
                token.cancel();
                for task in tasks {
                    let _ = task.await;
                }
                return Err(e).context("Failed to start HTTP server");
            }
        };
        tasks.push(server_task);

        *self.local_addr.write().await = Some(bound);
        self.emit_event(OrchestratorEvent::Listening { address: bound });

        Ok(RunningServices { token, tasks })
    }

    /// Stops the daemon orchestrator gracefully.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state == OrchestratorState::Stopped {
                return Ok(());
            }
            if *state == OrchestratorState::ShuttingDown {
                anyhow::bail!("Orchestrator is already shutting down");
            }
            *state = OrchestratorState::ShuttingDown;
        }
        self.emit_event(OrchestratorEvent::StateChanged(OrchestratorState::ShuttingDown));

        info!("Stopping daemon orchestrator...");

        if self.registry.is_enabled() {
            self.registry.detach();
            self.emit_event(OrchestratorEvent::InputDetached);
        }

        if let Some(services) = self.running.lock().await.take() {
            services.token.cancel();
            for task in services.tasks {
                if let Err(e) = task.await {
                    warn!("Task ended abnormally during shutdown: {}", e);
                }
            }
        }
        debug!("All services stopped");

        *self.local_addr.write().await = None;
        self.set_state(OrchestratorState::Stopped).await;

        info!("Daemon orchestrator stopped");
        Ok(())
    }

    async fn set_state(&self, new_state: OrchestratorState) {
        *self.state.write().await = new_state;
        self.emit_event(OrchestratorEvent::StateChanged(new_state));
    }

    /// Emits an orchestrator event.
    fn emit_event(&self, event: OrchestratorEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Returns the request router.
    pub fn router(&self) -> &Arc<RequestRouter> {
        &self.router
    }

    /// Returns the input registry.
    pub fn input_registry(&self) -> &InputRegistry {
        &self.registry
    }

    /// Returns the bound HTTP address while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read().await
    }

    /// Returns the configuration the orchestrator was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the parent shutdown token. Cancelling it stops every running service.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }
}
