//! HTTP endpoints under `/mouse/`.

use async_trait::async_trait;
use axum::http::Method;
use protocol::messages::{MouseMoved, MouseStatus, StatusReply};
use tracing::debug;

use super::context::{GestureAction, InputError, InputHandle, InputRegistry};
use super::gesture::{MouseButton, SwipeDirection};
use super::pointer::ScreenSize;
use crate::router::{HandlerError, Request, RequestHandler, Response};

/// Message sent when no input context is attached.
pub const SERVICE_UNAVAILABLE_MESSAGE: &str =
    "Enable the accessibility service in system settings first";

const POST_ROUTES: &[&str] = &[
    "/mouse/move",
    "/mouse/click",
    "/mouse/longclick",
    "/mouse/scroll",
    "/mouse/swipe",
    "/mouse/reset",
    "/mouse/show",
    "/mouse/hide",
];
const STATUS_ROUTE: &str = "/mouse/status";

/// Pointer movement, gestures and cursor visibility.
pub struct MouseHandler {
    registry: InputRegistry,
    /// Reported by `/mouse/status` while no context is attached.
    screen: ScreenSize,
    api_level: u32,
}

impl MouseHandler {
    pub fn new(registry: InputRegistry, screen: ScreenSize, api_level: u32) -> Self {
        Self {
            registry,
            screen,
            api_level,
        }
    }

    async fn status(&self) -> Result<Response, HandlerError> {
        let status = match self.registry.get() {
            Some(handle) => {
                let snapshot = handle.snapshot().await.map_err(unavailable)?;
                MouseStatus {
                    service_enabled: true,
                    mouse_x: snapshot.x,
                    mouse_y: snapshot.y,
                    screen_width: handle.screen().width,
                    screen_height: handle.screen().height,
                    api_level: handle.api_level(),
                }
            }
            None => MouseStatus {
                service_enabled: false,
                mouse_x: 0,
                mouse_y: 0,
                screen_width: self.screen.width,
                screen_height: self.screen.height,
                api_level: self.api_level,
            },
        };
        Ok(Response::json(&status))
    }

    async fn gesture(
        &self,
        handle: &InputHandle,
        action: GestureAction,
        failure: &str,
    ) -> Result<Response, HandlerError> {
        if handle.gesture(action).await.map_err(unavailable)? {
            Ok(Response::json(&StatusReply::ok()))
        } else {
            Ok(Response::json(&StatusReply::error(failure)))
        }
    }
}

fn unavailable(err: InputError) -> HandlerError {
    debug!(error = %err, "Input context unavailable");
    HandlerError::ServiceUnavailable(SERVICE_UNAVAILABLE_MESSAGE.to_string())
}

/// Parse an integer parameter, defaulting to 0 when absent.
fn int_param(request: &Request, name: &str) -> Result<i32, HandlerError> {
    match request.param(name) {
        None => Ok(0),
        Some(raw) => raw
            .parse()
            .map_err(|_| HandlerError::InvalidParams(format!("{name}={raw}"))),
    }
}

fn optional_int_param(request: &Request, name: &str) -> Result<Option<i32>, HandlerError> {
    match request.param(name) {
        None | Some("") => Ok(None),
        Some(_) => int_param(request, name).map(Some),
    }
}

#[async_trait]
impl RequestHandler for MouseHandler {
    fn name(&self) -> &'static str {
        "mouse"
    }

    fn matches(&self, request: &Request) -> bool {
        request.is(&Method::GET, STATUS_ROUTE)
            || POST_ROUTES
                .iter()
                .any(|path| request.is(&Method::POST, path))
    }

    async fn handle(&self, request: &Request) -> Result<Response, HandlerError> {
        if request.path == STATUS_ROUTE {
            return self.status().await;
        }

        let handle = self.registry.get().ok_or_else(|| {
            HandlerError::ServiceUnavailable(SERVICE_UNAVAILABLE_MESSAGE.to_string())
        })?;

        match request.path.as_str() {
            "/mouse/move" => {
                let dx = int_param(request, "dx")?;
                let dy = int_param(request, "dy")?;
                let (x, y) = handle.move_by(dx, dy).await.map_err(unavailable)?;
                Ok(Response::json(&MouseMoved::new(x, y)))
            }
            "/mouse/reset" => {
                let (x, y) = handle.reset().await.map_err(unavailable)?;
                Ok(Response::json(&MouseMoved::new(x, y)))
            }
            "/mouse/click" => {
                let button = MouseButton::from_code(int_param(request, "button")?);
                self.gesture(&handle, GestureAction::Click(button), "click failed")
                    .await
            }
            "/mouse/longclick" => {
                self.gesture(&handle, GestureAction::LongClick, "long click failed")
                    .await
            }
            "/mouse/scroll" => {
                let dy = int_param(request, "dy")?;
                self.gesture(&handle, GestureAction::Scroll(dy), "scroll failed")
                    .await
            }
            "/mouse/swipe" => {
                let direction: SwipeDirection = request
                    .param("direction")
                    .unwrap_or_default()
                    .parse()
                    .map_err(|e| HandlerError::InvalidParams(format!("{e}")))?;
                let distance = optional_int_param(request, "distance")?;
                self.gesture(
                    &handle,
                    GestureAction::Swipe(direction, distance),
                    "swipe failed",
                )
                .await
            }
            "/mouse/show" => {
                handle.show_cursor().await.map_err(unavailable)?;
                Ok(Response::json(&StatusReply::ok()))
            }
            "/mouse/hide" => {
                handle.hide_cursor().await.map_err(unavailable)?;
                Ok(Response::json(&StatusReply::ok()))
            }
            _ => Ok(Response::not_found()),
        }
    }
}
