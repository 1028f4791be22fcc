//! Video playback endpoints.
//!
//! Playback itself is delegated to whatever the host opens URLs with; this
//! handler only forwards the request and keeps the fast-forward step.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use tracing::{debug, info, warn};

use crate::router::{HandlerError, Request, RequestHandler, Response};

const PLAY_PATH: &str = "/play";
const STOP_PATH: &str = "/playStop";
const FAST_FORWARD_PATH: &str = "/changePlayFFI";

/// Opens a URL with the host's video handler.
pub trait VideoLauncher: Send + Sync {
    fn launch(&self, url: &str, use_system: bool) -> io::Result<()>;
}

/// Hands the URL to the desktop's default opener without waiting on it.
#[derive(Debug, Default)]
pub struct SystemVideoLauncher;

impl VideoLauncher for SystemVideoLauncher {
    fn launch(&self, url: &str, _use_system: bool) -> io::Result<()> {
        open::that_detached(url)
    }
}

pub struct PlayHandler {
    launcher: Arc<dyn VideoLauncher>,
    fast_forward_ms: AtomicU32,
}

impl PlayHandler {
    pub fn new(launcher: Arc<dyn VideoLauncher>, fast_forward_ms: u32) -> Self {
        Self {
            launcher,
            fast_forward_ms: AtomicU32::new(fast_forward_ms),
        }
    }

    /// Current fast-forward step in milliseconds.
    pub fn fast_forward_interval_ms(&self) -> u32 {
        self.fast_forward_ms.load(Ordering::Relaxed)
    }

    fn play(&self, request: &Request) {
        let url = match request.param("playUrl") {
            Some(url) if !url.is_empty() => url,
            _ => {
                debug!("Ignoring play request without a URL");
                return;
            }
        };
        let use_system = request
            .param("useSystem")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        match self.launcher.launch(url, use_system) {
            Ok(()) => info!(url, use_system, "Launched video"),
            Err(e) => warn!(url, error = %e, "Failed to launch video"),
        }
    }

    fn change_fast_forward(&self, request: &Request) {
        let Some(raw) = request.param("speedInterval").filter(|v| !v.is_empty()) else {
            return;
        };
        match raw.trim().parse::<u32>() {
            Ok(seconds) => {
                let ms = seconds.saturating_mul(1000);
                self.fast_forward_ms.store(ms, Ordering::Relaxed);
                debug!(interval_ms = ms, "Fast-forward interval changed");
            }
            Err(_) => debug!(value = raw, "Ignoring invalid speedInterval"),
        }
    }
}

#[async_trait]
impl RequestHandler for PlayHandler {
    fn name(&self) -> &'static str {
        "play"
    }

    fn matches(&self, request: &Request) -> bool {
        [PLAY_PATH, STOP_PATH, FAST_FORWARD_PATH]
            .iter()
            .any(|path| request.is(&Method::POST, path))
    }

    async fn handle(&self, request: &Request) -> Result<Response, HandlerError> {
        match request.path.as_str() {
            PLAY_PATH => self.play(request),
            FAST_FORWARD_PATH => self.change_fast_forward(request),
            _ => {}
        }
        Ok(Response::ok_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records launches instead of opening anything.
    #[derive(Default)]
    struct RecordingLauncher {
        launched: Mutex<Vec<(String, bool)>>,
        fail: bool,
    }

    impl VideoLauncher for RecordingLauncher {
        fn launch(&self, url: &str, use_system: bool) -> io::Result<()> {
            self.launched
                .lock()
                .unwrap()
                .push((url.to_string(), use_system));
            if self.fail {
                Err(io::Error::new(io::ErrorKind::NotFound, "no handler"))
            } else {
                Ok(())
            }
        }
    }

    fn handler() -> (PlayHandler, Arc<RecordingLauncher>) {
        let launcher = Arc::new(RecordingLauncher::default());
        (PlayHandler::new(launcher.clone(), 5000), launcher)
    }

    #[test]
    fn test_matches() {
        let (handler, _) = handler();
        assert!(handler.matches(&Request::post("/play")));
        assert!(handler.matches(&Request::post("/playStop")));
        assert!(handler.matches(&Request::post("/changePlayFFI")));
        assert!(!handler.matches(&Request::get("/play")));
        assert!(!handler.matches(&Request::post("/play/now")));
    }

    #[tokio::test]
    async fn test_play_launches_url() {
        let (handler, launcher) = handler();
        let request = Request::post("/play")
            .with_param("playUrl", "http://example.com/a.mp4")
            .with_param("useSystem", "TRUE");

        let response = handler.handle(&request).await.unwrap();
        assert_eq!(response.bytes().unwrap().as_ref(), b"ok");
        assert_eq!(
            *launcher.launched.lock().unwrap(),
            vec![("http://example.com/a.mp4".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn test_play_ignores_empty_url() {
        let (handler, launcher) = handler();

        let response = handler
            .handle(&Request::post("/play").with_param("playUrl", ""))
            .await
            .unwrap();
        assert_eq!(response.bytes().unwrap().as_ref(), b"ok");
        assert!(launcher.launched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_play_launch_failure_still_ok() {
        let launcher = Arc::new(RecordingLauncher {
            fail: true,
            ..Default::default()
        });
        let handler = PlayHandler::new(launcher.clone(), 5000);

        let response = handler
            .handle(&Request::post("/play").with_param("playUrl", "file:///a.mkv"))
            .await
            .unwrap();
        assert_eq!(response.bytes().unwrap().as_ref(), b"ok");
        assert!(!launcher.launched.lock().unwrap()[0].1);
    }

    #[tokio::test]
    async fn test_change_fast_forward() {
        let (handler, _) = handler();

        handler
            .handle(&Request::post("/changePlayFFI").with_param("speedInterval", "15"))
            .await
            .unwrap();
        assert_eq!(handler.fast_forward_interval_ms(), 15000);

        let response = handler
            .handle(&Request::post("/changePlayFFI").with_param("speedInterval", "fast"))
            .await
            .unwrap();
        assert_eq!(response.bytes().unwrap().as_ref(), b"ok");
        assert_eq!(handler.fast_forward_interval_ms(), 15000);
    }

    #[tokio::test]
    async fn test_stop_is_ok() {
        let (handler, launcher) = handler();
        let response = handler.handle(&Request::post("/playStop")).await.unwrap();
        assert_eq!(response.bytes().unwrap().as_ref(), b"ok");
        assert!(launcher.launched.lock().unwrap().is_empty());
    }
}
