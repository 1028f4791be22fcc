//! Request router for dispatching HTTP requests to pluggable handlers.
//!
//! This module provides the `RequestRouter`, which holds an ordered list of
//! [`RequestHandler`]s and hands each incoming [`Request`] to the first one
//! whose predicate matches. Handlers return a [`Response`] or a
//! [`HandlerError`], and every error is turned into a well-formed reply here
//! so a single bad request can never take the server down.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use bytes::Bytes;
use protocol::messages::{to_json, StatusReply, CODE_SERVICE_UNAVAILABLE};
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, warn};

use crate::files::sanitizer::SanitizeError;
use crate::files::transfer::DownloadSource;

/// Body of every 404 reply.
pub const NOT_FOUND_TEXT: &str = "Error 404, file not found.";

/// Body of every 403 reply for a rejected path.
pub const INVALID_PATH_TEXT: &str = "Invalid path";

pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";
pub const CONTENT_TYPE_JSON: &str = "application/json";

// ============================================================================
// Request
// ============================================================================

/// A decoded inbound request.
///
/// `params` merges query-string, urlencoded-form and multipart text fields.
/// `uploaded_files` maps multipart field names to staged temp files.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub params: HashMap<String, String>,
    pub uploaded_files: HashMap<String, PathBuf>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: HashMap::new(),
            uploaded_files: HashMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_upload(mut self, field: impl Into<String>, temp_file: impl Into<PathBuf>) -> Self {
        self.uploaded_files.insert(field.into(), temp_file.into());
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn uploaded_file(&self, field: &str) -> Option<&Path> {
        self.uploaded_files.get(field).map(PathBuf::as_path)
    }

    /// Whether this is a `method` request for exactly `path`.
    pub fn is(&self, method: &Method, path: &str) -> bool {
        self.method == *method && self.path == path
    }

    /// The remainder of the path after `prefix`, for a `method` request.
    pub fn tail<'a>(&'a self, method: &Method, prefix: &str) -> Option<&'a str> {
        if self.method != *method {
            return None;
        }
        self.path.strip_prefix(prefix)
    }
}

// ============================================================================
// Response
// ============================================================================

/// Response payload: in-memory bytes or a file streamed from disk.
#[derive(Debug)]
pub enum ResponseBody {
    Bytes(Bytes),
    File { file: tokio::fs::File, len: u64 },
}

/// A handler's reply, forwarded to the client unchanged.
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub content_type: String,
    pub body: ResponseBody,
}

impl Response {
    pub fn plain_text(status: StatusCode, text: impl Into<String>) -> Self {
        Self {
            status,
            content_type: CONTENT_TYPE_TEXT.to_string(),
            body: ResponseBody::Bytes(Bytes::from(text.into())),
        }
    }

    /// `200 ok` in plain text.
    pub fn ok_text() -> Self {
        Self::plain_text(StatusCode::OK, "ok")
    }

    /// A `200` JSON reply. Serialization failures become a `500`.
    pub fn json<T: Serialize>(body: &T) -> Self {
        match to_json(body) {
            Ok(bytes) => Self {
                status: StatusCode::OK,
                content_type: CONTENT_TYPE_JSON.to_string(),
                body: ResponseBody::Bytes(Bytes::from(bytes)),
            },
            Err(e) => {
                error!(error = %e, "Failed to serialize response body");
                Self::plain_text(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            }
        }
    }

    pub fn not_found() -> Self {
        Self::plain_text(StatusCode::NOT_FOUND, NOT_FOUND_TEXT)
    }

    pub fn forbidden() -> Self {
        Self::plain_text(StatusCode::FORBIDDEN, INVALID_PATH_TEXT)
    }

    /// Stream an opened file with its MIME type and length.
    pub fn file(source: DownloadSource) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: source.content_type,
            body: ResponseBody::File {
                file: source.file,
                len: source.len,
            },
        }
    }

    /// Length of the body, known up front for both variants.
    pub fn content_length(&self) -> u64 {
        match &self.body {
            ResponseBody::Bytes(bytes) => bytes.len() as u64,
            ResponseBody::File { len, .. } => *len,
        }
    }

    /// The in-memory body, if this is not a streamed file.
    pub fn bytes(&self) -> Option<&Bytes> {
        match &self.body {
            ResponseBody::Bytes(bytes) => Some(bytes),
            ResponseBody::File { .. } => None,
        }
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let content_length = self.content_length();
        let body = match self.body {
            ResponseBody::Bytes(bytes) => Body::from(bytes),
            ResponseBody::File { file, .. } => Body::from_stream(ReaderStream::new(file)),
        };

        let mut response = (self.status, body).into_response();
        let headers = response.headers_mut();
        match HeaderValue::from_str(&self.content_type) {
            Ok(value) => {
                headers.insert(header::CONTENT_TYPE, value);
            }
            Err(_) => {
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/octet-stream"),
                );
            }
        }
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content_length));
        response
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Errors a handler can return instead of a response.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Malformed numeric or string parameter.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// A client path failed sanitization.
    #[error("path rejected: {0}")]
    PathRejected(#[from] SanitizeError),

    /// Missing file or directory.
    #[error("not found: {0}")]
    NotFound(String),

    /// The input-injection service is not running.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Convert the error to the reply the client sees.
    ///
    /// Pointer endpoints report errors in-band with status 200. File
    /// endpoints use 403 for rejected paths and 404 for missing ones.
    pub fn to_response(&self) -> Response {
        match self {
            HandlerError::InvalidParams(_) => Response::json(&StatusReply::error("invalid params")),
            HandlerError::PathRejected(_) => Response::forbidden(),
            HandlerError::NotFound(_) => Response::not_found(),
            HandlerError::ServiceUnavailable(message) => Response::json(
                &StatusReply::error(message.clone()).with_code(CODE_SERVICE_UNAVAILABLE),
            ),
            HandlerError::Internal(_) => {
                Response::plain_text(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            }
        }
    }
}

/// A pluggable endpoint group.
///
/// `matches` must be cheap and side-effect free; it decides on method first,
/// then on a literal or prefix match of the path.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn matches(&self, request: &Request) -> bool;

    async fn handle(&self, request: &Request) -> Result<Response, HandlerError>;
}

/// Ordered handler registry. The first matching handler wins.
#[derive(Clone, Default)]
pub struct RequestRouter {
    handlers: Vec<Arc<dyn RequestHandler>>,
}

impl RequestRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler after all previously registered ones.
    pub fn register(&mut self, handler: Arc<dyn RequestHandler>) {
        debug!(handler = handler.name(), "Registered request handler");
        self.handlers.push(handler);
    }

    pub fn with_handler(mut self, handler: Arc<dyn RequestHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Route a request to the first matching handler.
    ///
    /// Unmatched requests get the fixed 404 reply.
    pub async fn dispatch(&self, request: &Request) -> Response {
        let Some(handler) = self.handlers.iter().find(|h| h.matches(request)) else {
            debug!(method = %request.method, path = %request.path, "No handler matched");
            return Response::not_found();
        };

        debug!(
            handler = handler.name(),
            method = %request.method,
            path = %request.path,
            "Dispatching request"
        );

        match handler.handle(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    handler = handler.name(),
                    path = %request.path,
                    error = %e,
                    "Handler failed"
                );
                e.to_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedHandler {
        name: &'static str,
        method: Method,
        prefix: &'static str,
        reply: &'static str,
    }

    #[async_trait]
    impl RequestHandler for FixedHandler {
        fn name(&self) -> &'static str {
            self.name
        }

        fn matches(&self, request: &Request) -> bool {
            request.tail(&self.method, self.prefix).is_some()
        }

        async fn handle(&self, _request: &Request) -> Result<Response, HandlerError> {
            Ok(Response::plain_text(StatusCode::OK, self.reply))
        }
    }

    struct FailingHandler(fn() -> HandlerError);

    #[async_trait]
    impl RequestHandler for FailingHandler {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn matches(&self, _request: &Request) -> bool {
            true
        }

        async fn handle(&self, _request: &Request) -> Result<Response, HandlerError> {
            Err((self.0)())
        }
    }

    fn body_text(response: &Response) -> String {
        String::from_utf8(response.bytes().unwrap().to_vec()).unwrap()
    }

    fn fixed(name: &'static str, method: Method, prefix: &'static str) -> Arc<dyn RequestHandler> {
        Arc::new(FixedHandler {
            name,
            method,
            prefix,
            reply: name,
        })
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let router = RequestRouter::new()
            .with_handler(fixed("specific", Method::GET, "/file/dir/"))
            .with_handler(fixed("general", Method::GET, "/file/"));

        let response = router.dispatch(&Request::get("/file/dir/Movies")).await;
        assert_eq!(body_text(&response), "specific");

        let response = router.dispatch(&Request::get("/file/download/a.txt")).await;
        assert_eq!(body_text(&response), "general");
    }

    #[tokio::test]
    async fn test_method_distinguishes_handlers() {
        let router = RequestRouter::new()
            .with_handler(fixed("get", Method::GET, "/mouse/"))
            .with_handler(fixed("post", Method::POST, "/mouse/"));

        let response = router.dispatch(&Request::post("/mouse/move")).await;
        assert_eq!(body_text(&response), "post");
    }

    #[tokio::test]
    async fn test_unmatched_route_is_404() {
        let router = RequestRouter::new().with_handler(fixed("files", Method::GET, "/file/"));

        let response = router.dispatch(&Request::get("/nothing/here")).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(body_text(&response), NOT_FOUND_TEXT);
        assert!(response.content_type.starts_with("text/plain"));

        let empty = RequestRouter::new();
        let response = empty.dispatch(&Request::post("/file/copy")).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_handler_errors_become_responses() {
        let router = RequestRouter::new().with_handler(Arc::new(FailingHandler(|| {
            HandlerError::InvalidParams("dx".to_string())
        })));
        let response = router.dispatch(&Request::post("/mouse/move")).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            body_text(&response),
            r#"{"status":"error","message":"invalid params"}"#
        );

        let router = RequestRouter::new().with_handler(Arc::new(FailingHandler(|| {
            HandlerError::PathRejected(SanitizeError::NullByte)
        })));
        let response = router.dispatch(&Request::get("/file/dir/x")).await;
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(body_text(&response), INVALID_PATH_TEXT);

        let router = RequestRouter::new().with_handler(Arc::new(FailingHandler(|| {
            HandlerError::NotFound("x".to_string())
        })));
        let response = router.dispatch(&Request::get("/file/download/x")).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_service_unavailable_carries_code() {
        let response =
            HandlerError::ServiceUnavailable("enable the service".to_string()).to_response();
        let value: serde_json::Value =
            serde_json::from_slice(response.bytes().unwrap()).unwrap();

        assert_eq!(value["status"], "error");
        assert_eq!(value["code"], CODE_SERVICE_UNAVAILABLE);
        assert_eq!(value["message"], "enable the service");
    }

    #[test]
    fn test_request_helpers() {
        let request = Request::post("/file/upload")
            .with_param("path", "Movies")
            .with_upload("file", "/tmp/upload.tmp");

        assert_eq!(request.param("path"), Some("Movies"));
        assert_eq!(request.param("missing"), None);
        assert_eq!(request.uploaded_file("file"), Some(Path::new("/tmp/upload.tmp")));
        assert!(request.is(&Method::POST, "/file/upload"));
        assert!(!request.is(&Method::GET, "/file/upload"));
        assert_eq!(request.tail(&Method::POST, "/file/"), Some("upload"));
        assert_eq!(request.tail(&Method::GET, "/file/"), None);
    }

    #[test]
    fn test_response_content_length() {
        assert_eq!(Response::ok_text().content_length(), 2);
        assert_eq!(Response::not_found().content_length(), NOT_FOUND_TEXT.len() as u64);
    }

    #[test]
    fn test_handler_names_in_order() {
        let router = RequestRouter::new()
            .with_handler(fixed("a", Method::GET, "/a"))
            .with_handler(fixed("b", Method::GET, "/b"));
        assert_eq!(router.handler_names(), vec!["a", "b"]);
    }
}
