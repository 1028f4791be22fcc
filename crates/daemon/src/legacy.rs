//! Torrent endpoints kept so older clients get a clear answer.

use async_trait::async_trait;
use axum::http::Method;
use protocol::messages::LegacyReply;
use tracing::debug;

use crate::router::{HandlerError, Request, RequestHandler, Response};

const TORRENT_PATH: &str = "/torrent";

/// Answers every torrent request with `{"success":false,"message":"removed"}`.
#[derive(Debug, Default)]
pub struct TorrentHandler;

#[async_trait]
impl RequestHandler for TorrentHandler {
    fn name(&self) -> &'static str {
        "torrent"
    }

    fn matches(&self, request: &Request) -> bool {
        if request.path.eq_ignore_ascii_case(TORRENT_PATH) {
            return true;
        }
        request.method == Method::POST
            && request
                .path
                .strip_prefix(TORRENT_PATH)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    async fn handle(&self, request: &Request) -> Result<Response, HandlerError> {
        debug!(path = %request.path, "Torrent request on removed endpoint");
        Ok(Response::json(&LegacyReply::removed()))
    }
}
