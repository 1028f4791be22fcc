//! HTTP bridge between axum and the [`RequestRouter`].
//!
//! Every request lands in a single fallback handler which flattens the query
//! string, form body and multipart fields into a router [`Request`]. Multipart
//! file parts are streamed to disk first; whatever is left of them after
//! dispatch is removed.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{
    multipart::{MultipartError, MultipartRejection},
    rejection::FormRejection,
    DefaultBodyLimit, FromRequest, Multipart, Query, Request as HttpRequest, State,
};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::{Form, Router};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::router::{Request, RequestRouter};

/// HTTP bridge errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("invalid multipart request: {0}")]
    MultipartRejected(#[from] MultipartRejection),

    #[error("malformed form body: {0}")]
    Form(#[from] FormRejection),

    #[error("failed to stage upload: {0}")]
    Staging(#[from] io::Error),
}

struct BridgeState {
    router: Arc<RequestRouter>,
    upload_dir: PathBuf,
}

/// Temp files written for multipart file parts of one request.
#[derive(Debug, Default)]
struct StagedUploads(Vec<PathBuf>);

impl StagedUploads {
    /// Remove staged files that the handler did not move away.
    async fn cleanup(self) {
        for path in self.0 {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "Removed unclaimed upload"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove upload"),
            }
        }
    }
}

/// Build the axum application around `router`.
pub fn build_app(router: Arc<RequestRouter>, upload_dir: PathBuf, max_body_size: u64) -> Router {
    let state = Arc::new(BridgeState { router, upload_dir });
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);

    Router::new()
        .fallback(bridge)
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `address` and serve `app` until `shutdown` is cancelled.
///
/// Returns the bound address (useful with port 0) and the serving task.
pub async fn start_server(
    address: &str,
    app: Router,
    shutdown: CancellationToken,
) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
    let bind_error = |source| ServerError::Bind {
        address: address.to_string(),
        source,
    };
    let listener = TcpListener::bind(address).await.map_err(bind_error)?;
    let bound = listener.local_addr().map_err(bind_error)?;
    info!(address = %bound, "HTTP server listening");

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                info!("HTTP server shutting down");
            })
            .await
        {
            error!(error = %e, "HTTP server error");
        }
    });

    Ok((bound, task))
}

async fn bridge(State(state): State<Arc<BridgeState>>, http: HttpRequest) -> HttpResponse {
    let mut staged = StagedUploads::default();

    let response = match read_request(http, &state.upload_dir, &mut staged).await {
        Ok(request) => state.router.dispatch(&request).await.into_response(),
        Err(e) => {
            warn!(error = %e, "Rejecting unreadable request");
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    };

    staged.cleanup().await;
    response
}

async fn read_request(
    http: HttpRequest,
    upload_dir: &Path,
    staged: &mut StagedUploads,
) -> Result<Request, ServerError> {
    let mut request = Request::new(http.method().clone(), http.uri().path());

    if let Ok(Query(query)) = Query::<Vec<(String, String)>>::try_from_uri(http.uri()) {
        request.params.extend(query);
    }

    let content_type = http
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(http, &()).await?;
        read_multipart(multipart, upload_dir, &mut request, staged).await?;
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(form) = Form::<HashMap<String, String>>::from_request(http, &()).await?;
        request.params.extend(form);
    }

    Ok(request)
}

async fn read_multipart(
    mut multipart: Multipart,
    upload_dir: &Path,
    request: &mut Request,
    staged: &mut StagedUploads,
) -> Result<(), ServerError> {
    while let Some(mut field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let text = field.text().await?;
            request.params.insert(name, text);
            continue;
        };

        tokio::fs::create_dir_all(upload_dir).await?;
        let temp = upload_dir.join(format!("upload-{}", Uuid::new_v4()));
        staged.0.push(temp.clone());

        let mut out = tokio::fs::File::create(&temp).await?;
        let mut written = 0u64;
        while let Some(chunk) = field.chunk().await? {
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.flush().await?;

        debug!(field = %name, file_name = %file_name, bytes = written, "Staged upload");
        request.params.insert(name.clone(), file_name);
        request.uploaded_files.insert(name, temp);
    }
    Ok(())
}
