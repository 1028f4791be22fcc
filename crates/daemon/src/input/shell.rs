//! Remote shell channel used by the second injection tier.
//!
//! A [`ShellChannel`] is a long-lived connection that executes one command
//! line per message. [`TcpShellChannel`] keeps such a connection to a
//! `host:port` endpoint (for example a forwarded debug shell), reconnecting
//! with exponential backoff whenever it drops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

const INITIAL_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 30_000;
const BACKOFF_MULTIPLIER: u32 = 2;
const COMMAND_QUEUE_DEPTH: usize = 64;

/// A pre-established channel able to run short shell commands.
pub trait ShellChannel: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Queue `command` for execution. Returns `false` if it cannot be sent.
    fn send(&self, command: &str) -> bool;
}

/// [`ShellChannel`] over a plain TCP connection, one command per line.
pub struct TcpShellChannel {
    address: String,
    connected: Arc<AtomicBool>,
    commands: mpsc::Sender<String>,
}

impl TcpShellChannel {
    /// Start maintaining a connection to `address`.
    ///
    /// The connection task runs until `shutdown` is cancelled.
    pub fn spawn(address: impl Into<String>, shutdown: CancellationToken) -> (Self, JoinHandle<()>) {
        let address = address.into();
        let connected = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        let task = tokio::spawn(run_connection_loop(
            address.clone(),
            Arc::clone(&connected),
            rx,
            shutdown,
        ));

        (
            Self {
                address,
                connected,
                commands: tx,
            },
            task,
        )
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl ShellChannel for TcpShellChannel {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn send(&self, command: &str) -> bool {
        if !self.is_connected() {
            return false;
        }
        match self.commands.try_send(command.to_string()) {
            Ok(()) => true,
            Err(e) => {
                warn!(address = %self.address, error = %e, "Shell channel queue rejected command");
                false
            }
        }
    }
}

async fn run_connection_loop(
    address: String,
    connected: Arc<AtomicBool>,
    mut commands: mpsc::Receiver<String>,
    shutdown: CancellationToken,
) {
    let mut backoff = Duration::from_millis(INITIAL_BACKOFF_MS);

    loop {
        let stream = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = TcpStream::connect(&address) => result,
        };

        match stream {
            Ok(stream) => {
                info!(address = %address, "Shell channel connected");
                backoff = Duration::from_millis(INITIAL_BACKOFF_MS);
                connected.store(true, Ordering::Release);

                let finished = serve_connection(stream, &mut commands, &shutdown).await;
                connected.store(false, Ordering::Release);

                if finished {
                    break;
                }
                info!(address = %address, "Shell channel disconnected");
            }
            Err(e) => {
                debug!(address = %address, error = %e, "Shell channel connect failed");
            }
        }

        // Drop anything queued against the dead connection.
        while commands.try_recv().is_ok() {}

        trace!(address = %address, ?backoff, "Reconnecting shell channel");
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = std::cmp::min(
            backoff * BACKOFF_MULTIPLIER,
            Duration::from_millis(MAX_BACKOFF_MS),
        );
    }

    connected.store(false, Ordering::Release);
    debug!(address = %address, "Shell channel task stopped");
}

/// Pump commands into `stream` until it closes. Returns `true` on shutdown.
async fn serve_connection(
    stream: TcpStream,
    commands: &mut mpsc::Receiver<String>,
    shutdown: &CancellationToken,
) -> bool {
    let (mut reader, mut writer) = stream.into_split();
    let mut scratch = [0u8; 1024];

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return true,
            command = commands.recv() => {
                let Some(command) = command else { return true };
                let mut line = command.into_bytes();
                line.push(b'\n');
                if let Err(e) = writer.write_all(&line).await {
                    warn!(error = %e, "Shell channel write failed");
                    return false;
                }
            }
            read = reader.read(&mut scratch) => match read {
                Ok(0) | Err(_) => return false,
                Ok(n) => trace!(bytes = n, "Shell channel output discarded"),
            },
        }
    }
}
