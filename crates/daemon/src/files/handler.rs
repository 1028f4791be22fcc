//! HTTP endpoints under `/file/`.

use async_trait::async_trait;
use axum::http::Method;
use protocol::messages::UploadReply;
use tracing::{debug, warn};

use super::browser::{self, BrowserError};
use super::sanitizer::{PathSanitizer, SanitizedPath};
use super::transfer::{self, BatchOp};
use crate::router::{HandlerError, Request, RequestHandler, Response, INVALID_PATH_TEXT};

const DIR_PREFIX: &str = "/file/dir/";
const DOWNLOAD_PREFIX: &str = "/file/download/";
const COPY_PATH: &str = "/file/copy";
const CUT_PATH: &str = "/file/cut";
const DELETE_PATH: &str = "/file/delete";
const UPLOAD_PATH: &str = "/file/upload";

/// Separator between entries of the `paths` parameter.
pub const PATH_LIST_SEPARATOR: char = '|';

/// Directory listing, download, upload and batch copy/cut/delete.
///
/// Every client path goes through the [`PathSanitizer`] before the
/// filesystem is touched.
#[derive(Debug, Clone)]
pub struct FileHandler {
    sanitizer: PathSanitizer,
}

impl FileHandler {
    pub fn new(sanitizer: PathSanitizer) -> Self {
        Self { sanitizer }
    }

    async fn list(&self, raw: &str) -> Result<Response, HandlerError> {
        let dir = self.sanitizer.sanitize(raw)?;

        let listing = tokio::task::spawn_blocking(move || browser::list_directory(&dir))
            .await
            .map_err(|e| HandlerError::Internal(e.to_string()))?;

        match listing {
            Ok(listing) => Ok(Response::json(&listing)),
            Err(e @ (BrowserError::PathNotFound(_) | BrowserError::NotADirectory(_))) => {
                Err(HandlerError::NotFound(e.to_string()))
            }
            Err(BrowserError::Io(e)) => Err(HandlerError::NotFound(e.to_string())),
        }
    }

    async fn download(&self, raw: &str) -> Result<Response, HandlerError> {
        let file = self.sanitizer.sanitize(raw)?;

        let source = transfer::open_download(&file)
            .await
            .map_err(|e| HandlerError::NotFound(e.to_string()))?;

        debug!(
            path = %file.as_path().display(),
            len = source.len,
            content_type = %source.content_type,
            "Streaming download"
        );
        Ok(Response::file(source))
    }

    async fn upload(&self, request: &Request) -> Result<Response, HandlerError> {
        let (Some(client_name), Some(temp_file)) = (
            request.param("file").filter(|name| !name.is_empty()),
            request.uploaded_file("file"),
        ) else {
            debug!("Upload without a file part");
            return Ok(Response::json(&UploadReply::failed()));
        };

        let Some(raw_target) = request.param("path") else {
            warn!("Upload without a target path");
            return Ok(Response::json(&UploadReply::rejected(INVALID_PATH_TEXT)));
        };
        let target = match self.sanitizer.sanitize(raw_target) {
            Ok(target) => target,
            Err(e) => {
                warn!(error = %e, "Upload target rejected");
                return Ok(Response::json(&UploadReply::rejected(INVALID_PATH_TEXT)));
            }
        };

        let client_name = client_name.to_string();
        let temp_file = temp_file.to_path_buf();
        let placed = tokio::task::spawn_blocking(move || {
            transfer::place_upload(&temp_file, &target, &client_name)
        })
        .await
        .map_err(|e| HandlerError::Internal(e.to_string()))?;

        match placed {
            Ok(_) => Ok(Response::json(&UploadReply::succeeded())),
            Err(e) => {
                warn!(error = %e, "Upload failed");
                Ok(Response::json(&UploadReply::failed()))
            }
        }
    }

    async fn batch(&self, op: BatchOp, request: &Request) -> Result<Response, HandlerError> {
        let sources = self.sanitize_list(request.param("paths").unwrap_or_default());

        let target = if op.needs_target() {
            request
                .param("targetPath")
                .and_then(|raw| match self.sanitizer.sanitize(raw) {
                    Ok(target) => Some(target),
                    Err(e) => {
                        warn!(op = op.as_str(), error = %e, "Batch target rejected");
                        None
                    }
                })
        } else {
            None
        };

        if op.needs_target() && target.is_none() {
            debug!(op = op.as_str(), "Batch without a usable target ignored");
            return Ok(Response::ok_text());
        }

        tokio::task::spawn_blocking(move || transfer::run_batch(op, &sources, target.as_ref()))
            .await
            .map_err(|e| HandlerError::Internal(e.to_string()))?;

        Ok(Response::ok_text())
    }

    /// Sanitize each `|`-separated entry, dropping the ones that fail.
    fn sanitize_list(&self, raw: &str) -> Vec<SanitizedPath> {
        raw.split(PATH_LIST_SEPARATOR)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| match self.sanitizer.sanitize(entry) {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(path = %entry, error = %e, "Skipping rejected batch entry");
                    None
                }
            })
            .collect()
    }
}

/// Directory listings answer both GET and POST.
fn dir_tail(request: &Request) -> Option<&str> {
    request
        .tail(&Method::GET, DIR_PREFIX)
        .or_else(|| request.tail(&Method::POST, DIR_PREFIX))
}

#[async_trait]
impl RequestHandler for FileHandler {
    fn name(&self) -> &'static str {
        "files"
    }

    fn matches(&self, request: &Request) -> bool {
        dir_tail(request).is_some()
            || request.tail(&Method::GET, DOWNLOAD_PREFIX).is_some()
            || [COPY_PATH, CUT_PATH, DELETE_PATH, UPLOAD_PATH]
                .iter()
                .any(|path| request.is(&Method::POST, path))
    }

    async fn handle(&self, request: &Request) -> Result<Response, HandlerError> {
        if let Some(raw) = dir_tail(request) {
            return self.list(raw).await;
        }
        if let Some(raw) = request.tail(&Method::GET, DOWNLOAD_PREFIX) {
            return self.download(raw).await;
        }

        match request.path.as_str() {
            UPLOAD_PATH => self.upload(request).await,
            COPY_PATH => self.batch(BatchOp::Copy, request).await,
            CUT_PATH => self.batch(BatchOp::Cut, request).await,
            DELETE_PATH => self.batch(BatchOp::Delete, request).await,
            _ => Ok(Response::not_found()),
        }
    }
}
